//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from Rust type definitions.
//!
//! This binary uses the `kube` crate's `CustomResourceExt` trait to generate
//! the CRD YAML for the `Request` and `DisposableRequest` resources.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/http-resources.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use http_resource_controller::crd::{DisposableRequest, Request};
use kube::core::CustomResourceExt;

fn main() {
    let crds = [Request::crd(), DisposableRequest::crd()];

    // Print header comments warning that this file should not be edited manually
    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("# If there are malformed YAML issues, fix them in the Rust code (src/crd/)");
    println!("# This file will be overwritten on every code update");
    println!("#");

    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
