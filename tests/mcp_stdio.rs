use std::path::{Path, PathBuf};

use cdpqa::{EngineConfig, Index, IndexDb, corpus, walker};
use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

fn setup_fixture(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let docs_dir = data_dir.join("docs");
    std::fs::create_dir_all(&docs_dir)?;
    std::fs::write(
        docs_dir.join("segment_docs.json"),
        json!([{
            "title": "Adding a Source",
            "content": "To add a source: 1. Open the Sources page in your workspace. 2. Click Add Source. 3. Choose the source type and name it.",
            "url": "https://segment.com/docs/connections/sources/",
            "topic": "segment"
        }])
        .to_string(),
    )?;
    std::fs::write(
        docs_dir.join("lytics_docs.json"),
        json!([{
            "title": "Building Audiences",
            "content": "Create an audience from the Audiences tab by combining behavioral rules.",
            "url": "https://docs.lytics.com/docs/audiences",
            "topic": "lytics"
        }])
        .to_string(),
    )?;

    let report = corpus::load_docs_dir(
        &docs_dir,
        walker::DEFAULT_PATTERN,
        EngineConfig::default().split_options(),
    )?;
    let index = Index::build(report.chunks)?;
    IndexDb::open(&data_dir.join("index.redb"))?.save(&index)?;
    Ok(())
}

#[tokio::test]
async fn mcp_stdio_answer_roundtrip() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let bin = cdpqa_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp").env("CDPQA_DATA_DIR", tempdir.path());
        }),
    )?;

    let client = ().serve(transport).await?;

    let args = json!({ "question": "How do I set up a new source in Segment?" });
    let result = client
        .peer()
        .call_tool(CallToolRequestParams::new("cdp_answer")
            .with_arguments(args.as_object().unwrap().clone()))
        .await?;

    let structured = result.structured_content.expect("structured content");
    assert_eq!(
        structured.get("status").and_then(|v| v.as_str()),
        Some("answered")
    );
    let citations = structured
        .get("citations")
        .and_then(|v| v.as_array())
        .expect("citations array");
    assert_eq!(
        citations[0].get("source").and_then(|v| v.as_str()),
        Some("https://segment.com/docs/connections/sources/")
    );

    let status = client
        .peer()
        .call_tool(CallToolRequestParams::new("cdp_status"))
        .await?;
    let structured = status.structured_content.expect("structured content");
    assert_eq!(structured.get("ready"), Some(&json!(true)));
    assert_eq!(
        structured
            .pointer("/index/indexed_chunks")
            .and_then(|v| v.as_u64()),
        Some(2)
    );

    client.cancel().await?;
    Ok(())
}

fn cdpqa_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_cdpqa") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("cdpqa");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
