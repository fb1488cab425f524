//! Compiles the `coupon.v1` protobuf definition with `tonic-prost-build`.
//!
//! The file descriptor set is written next to the generated code so the
//! server can register it with the gRPC reflection service.

use std::env;
use std::path::PathBuf;

fn main() {
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("coupon_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/coupon.proto"], &["proto"])
        .unwrap();
}
