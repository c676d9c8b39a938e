// build.rs

fn main() {
    // Generate build info (timestamp shown by `proc-sentinel check`)
    vergen::EmitBuilder::builder()
        .build_timestamp()
        .emit()
        .expect("Unable to generate build info");
}
