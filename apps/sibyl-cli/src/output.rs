pub fn print_banner() {
    println!("sibyl {}", env!("CARGO_PKG_VERSION"));
}
