// Build script to regenerate the Auth Service gRPC client.
//
// The generated code is checked in under src/generated so normal builds do
// not need protoc. Set TOKEN_CACHE_REGENERATE_PROTO=1 to rebuild it after
// editing proto/auth_service.proto.

#[allow(deprecated)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/auth_service.proto");
    println!("cargo:rerun-if-env-changed=TOKEN_CACHE_REGENERATE_PROTO");

    if std::env::var_os("TOKEN_CACHE_REGENERATE_PROTO").is_none() {
        return Ok(());
    }

    tonic_build::configure()
        .build_server(false)
        .out_dir("src/generated")
        .compile(&["proto/auth_service.proto"], &["proto/"])?;

    Ok(())
}
