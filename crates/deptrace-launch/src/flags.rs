//! Command line for the instrumented geth.

use deptrace_core::ResolvedConfig;

use crate::error::Result;

/// Name the tracer registers under in geth's live tracer directory.
pub const TRACER_NAME: &str = "dep";

/// HTTP APIs exposed by the development node.
pub const HTTP_API: &str = "web3,eth,debug,personal,net";

/// Flags for a single-node development chain with the tracer attached.
///
/// The resolved config is passed through whole as `--vmtrace.jsonconfig`.
pub fn node_args(config: &ResolvedConfig, http_addr: Option<&str>) -> Result<Vec<String>> {
    let mut args: Vec<String> = vec![
        "--vmtrace".into(),
        TRACER_NAME.into(),
        "--vmtrace.jsonconfig".into(),
        config.to_json()?,
        "--dev".into(),
        "--nodiscover".into(),
        "--maxpeers".into(),
        "0".into(),
        "--mine".into(),
        "--http".into(),
        "--http.corsdomain".into(),
        "*".into(),
        "--http.api".into(),
        HTTP_API.into(),
    ];

    if let Some(addr) = http_addr {
        args.push("--http.addr".into());
        args.push(addr.into());
    }
    Ok(args)
}
