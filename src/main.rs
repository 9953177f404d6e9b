fn main() {
    if let Err(err) = orders_etl::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
