// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .extern_path(".kitchen.bus.v1", "::kitchen_bus::proto")
        .compile_protos(
            &["../../proto/kitchen/v1/robot.proto", "../../proto/kitchen/v1/conveyor.proto"],
            &["../../proto"],
        )?;
    println!("cargo:rerun-if-changed=../../proto/kitchen/v1/robot.proto");
    println!("cargo:rerun-if-changed=../../proto/kitchen/v1/conveyor.proto");
    Ok(())
}
