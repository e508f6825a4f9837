fn main() {
    std::process::exit(pace_lib::main());
}
