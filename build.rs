// build.rs

use std::process::Command;

const SHADERS: &[(&str, &str)] = &[
    ("shaders/shader.vert", "shaders/vert.spv"),
    ("shaders/shader.frag", "shaders/frag.spv"),
];

fn main() {
    for (source, output) in SHADERS {
        match Command::new("glslc").args([*source, "-o", *output]).status() {
            Err(err) => {
                // The bytecode is loaded at runtime, so a missing compiler is not fatal here.
                println!("cargo::warning=could not run glslc for {}: {}", source, err);
            }
            Ok(status) if !status.success() => {
                println!("cargo::warning=glslc failed for {}: {}", source, status);
            }
            Ok(_) => {}
        }
        println!("cargo::rerun-if-changed={}", source);
    }
}
