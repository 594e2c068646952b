fn main() {
    roan::board::attack_tables::init();
    roan::uci::run();
}
