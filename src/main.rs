fn main() {
    watchflow_lib::run()
}
