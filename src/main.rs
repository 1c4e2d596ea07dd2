fn main() {
    pixel_painter::run();
}
