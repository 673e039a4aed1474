fn main() {
    if let Err(err) = soda_pull::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
