use std::env;

const HEADER: &str = r#"// Bindings to gpsrider
//
// Values handed to gpsrider_dispatch_* are borrowed for the duration of the
// call. Strings written back into a GpsRiderCall are owned by the caller and
// must be released with gpsrider_string_free.

#include <stdbool.h>
#include <stdint.h>
"#;

fn main() {
    println!("cargo:rerun-if-changed=src");
    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };

    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_header(HEADER)
        .with_language(cbindgen::Language::C)
        .with_include_guard("GPSRIDER_H")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file("gpsrider.h");
        }
        Err(e) => println!("cargo:warning=Unable to generate bindings: {e}"),
    }
}
