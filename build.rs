fn main() {
    // The ESP-IDF environment is only needed for the firmware image; host
    // builds (simulator, tests) skip it. TARGET is the cross target here.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
