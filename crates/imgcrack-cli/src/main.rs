fn main() {
    if let Err(error) = imgcrack_cli::run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
