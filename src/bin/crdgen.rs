// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `DNSRecord` CRD manifest from the Rust type in src/crd.rs so
//! the YAML in deploy/crds/ never drifts from the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use glbc::crd::DNSRecord;
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");
    generate_crd::<DNSRecord>("dnsrecords.crd.yaml", output_dir)?;
    println!("✓ Successfully generated CRD YAML files in deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let output_path = output_dir.join(filename);
    fs::write(&output_path, format!("{COPYRIGHT_HEADER}{yaml}"))?;

    println!("  ✓ Generated {filename}");
    Ok(())
}
