use miette::{IntoDiagnostic, Result};
use nodezip_core::BuildInfo;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    ok: bool,
    #[serde(flatten)]
    build: BuildInfo,
}

pub fn run(json: bool) -> Result<()> {
    let build = BuildInfo::current();
    if json {
        let out = VersionOutput { ok: true, build };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        println!("{build}");
    }
    Ok(())
}
