/// Display version information
pub fn execute() {
    println!("securestore {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
}
