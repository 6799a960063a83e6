const fn unwrap_or_cargo_version(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Handler version, overridable at build time through `HANDLER_VERSION`.
pub const VERSION: &str = unwrap_or_cargo_version(option_env!("HANDLER_VERSION"));

/// Plugin name, also the root of the annotation keyspace.
pub const HANDLER_NAME: &str = "sensu-squadcast-webhook-handler";
