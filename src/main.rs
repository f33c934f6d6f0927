fn main() {
    if let Err(err) = shiplock::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
