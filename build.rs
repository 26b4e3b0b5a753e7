fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep the generated client in sync with the canonical wire contract
    tonic_prost_build::configure()
        .build_server(false) // Client only, no server code generation
        .build_transport(false)
        .compile_protos(&["proto/frames.proto"], &["proto"])?;

    Ok(())
}
