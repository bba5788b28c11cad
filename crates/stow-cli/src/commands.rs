use std::io::Write;
use std::path::Path;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use colored::Colorize;
use stow_codec::{Metadata, TextEncoding, Value};
use stow_store::{BackendConfig, ObjectLocation, StorageClient, StoreConfig, StoredObject, Transport};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
    let client = config.open().context("failed to open store")?;
    let format = cli.format;
    match cli.command {
        Command::Mb(args) => cmd_mb(&client, args),
        Command::Rb(args) => cmd_rb(&client, args),
        Command::Put(args) => cmd_put(&client, &config, args, &format),
        Command::Get(args) => cmd_get(&client, args, &format),
        Command::Rm(args) => cmd_rm(&client, args),
        Command::Ls(args) => cmd_ls(&client, args, &format),
    }
}

fn load_config(path: Option<&Path>, root: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = root {
        config.backend = BackendConfig::Filesystem {
            root: root.to_path_buf(),
        };
    }
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn cmd_mb<T: Transport>(client: &StorageClient<T>, args: MbArgs) -> anyhow::Result<()> {
    let bucket = client.ensure_bucket(&args.bucket)?;
    println!("{} Bucket {} ready", "✓".green().bold(), bucket.bold());
    Ok(())
}

fn cmd_rb<T: Transport>(client: &StorageClient<T>, args: RbArgs) -> anyhow::Result<()> {
    client.remove_bucket(&args.bucket, args.force)?;
    println!("{} Removed bucket {}", "✓".green().bold(), args.bucket.bold());
    Ok(())
}

fn cmd_put<T: Transport>(
    client: &StorageClient<T>,
    config: &StoreConfig,
    args: PutArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let value = read_value(&args.source)?;
    let encoding = match &args.encoding {
        Some(name) => name.parse::<TextEncoding>()?,
        None => config.default_encoding,
    };
    let metadata = if args.meta.is_empty() {
        None
    } else {
        Some(
            args.meta
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect::<Metadata>(),
        )
    };
    let stored = client.put_with_encoding(&args.bucket, &args.key, value, metadata, encoding)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&object_json(&stored))?),
        OutputFormat::Text => println!(
            "{} Stored {} ({})",
            "✓".green().bold(),
            stored.location().to_string().bold(),
            stored.value().type_name().cyan()
        ),
    }
    Ok(())
}

fn read_value(source: &ValueSource) -> anyhow::Result<Value> {
    if let Some(text) = &source.text {
        return Ok(Value::from(text.as_str()));
    }
    if let Some(json) = &source.json {
        let parsed: serde_json::Value = serde_json::from_str(json).context("invalid --json value")?;
        return Ok(Value::try_from(parsed)?);
    }
    if let Some(path) = &source.file {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        return Ok(Value::Bytes(bytes));
    }
    anyhow::bail!("one of --text, --json or --file is required")
}

fn cmd_get<T: Transport>(
    client: &StorageClient<T>,
    args: GetArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let object = if args.raw {
        client.get_raw(&args.bucket, &args.key)?
    } else {
        client.get(&args.bucket, &args.key)?
    };

    if let Some(path) = &args.output {
        std::fs::write(path, value_bytes(object.value())?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{} Wrote {} to {}", "✓".green().bold(), object.location(), path.display());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&object_json(&object))?),
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&value_bytes(object.value())?)?;
            if !matches!(object.value(), Value::Bytes(_)) {
                writeln!(stdout)?;
            }
            for (key, value) in object.metadata() {
                eprintln!("{} {} = {}", "meta".dimmed(), key.bold(), value);
            }
        }
    }
    Ok(())
}

fn value_bytes(value: &Value) -> anyhow::Result<Vec<u8>> {
    Ok(match value {
        Value::Bytes(bytes) => bytes.clone(),
        Value::Text(text) => text.as_bytes().to_vec(),
        Value::Record(record) => serde_json::to_vec_pretty(record)?,
    })
}

fn object_json(object: &StoredObject) -> serde_json::Value {
    let value = match object.value() {
        Value::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
        Value::Text(text) => serde_json::Value::String(text.clone()),
        Value::Record(record) => serde_json::Value::Object(record.clone()),
    };
    serde_json::json!({
        "bucket": object.bucket(),
        "key": object.key(),
        "kind": object.value().type_name(),
        "value": value,
        "metadata": object.metadata(),
    })
}

fn cmd_rm<T: Transport>(client: &StorageClient<T>, args: RmArgs) -> anyhow::Result<()> {
    let targets: Vec<ObjectLocation> = args
        .keys
        .iter()
        .map(|key| ObjectLocation::new(&args.bucket, key))
        .collect();
    client.remove_many(&targets)?;
    for target in &targets {
        println!("  {} {}", "removed:".red(), target);
    }
    Ok(())
}

fn cmd_ls<T: Transport>(
    client: &StorageClient<T>,
    args: LsArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let listing = client.list(&args.bucket, args.recursive)?;
    match format {
        OutputFormat::Json => {
            let keys: Vec<&str> = listing.iter().map(|l| l.key.as_str()).collect();
            println!("{}", serde_json::to_string(&keys)?);
        }
        OutputFormat::Text => {
            if listing.is_empty() {
                println!("No objects in {}.", args.bucket.bold());
            }
            for location in &listing {
                println!("{}", location.key);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use stow_store::InMemoryTransport;

    fn memory_client() -> StorageClient<InMemoryTransport> {
        let client = StorageClient::new(InMemoryTransport::new());
        client.ensure_bucket("rabbit").unwrap();
        client
    }

    fn put_args(argv: &[&str]) -> PutArgs {
        let mut full = vec!["stow", "put", "rabbit", "k"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Put(args) => args,
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn root_overrides_backend() {
        let config = load_config(None, Some(Path::new("/tmp/stow"))).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Filesystem { root: "/tmp/stow".into() }
        );
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stow.toml");
        std::fs::write(&path, "auto_create_buckets = true\n[backend]\nkind = \"memory\"\n").unwrap();
        let config = load_config(Some(&path), None).unwrap();
        assert!(config.auto_create_buckets);
        assert_eq!(config.backend, BackendConfig::Memory);
    }

    #[test]
    fn json_source_must_be_object_or_string() {
        let args = put_args(&["--json", "12345"]);
        let err = read_value(&args.source).unwrap_err();
        assert!(err.to_string().contains("int"));

        let args = put_args(&["--json", r#"{"hello": "world"}"#]);
        assert!(matches!(read_value(&args.source).unwrap(), Value::Record(_)));
    }

    #[test]
    fn put_then_get_through_commands() {
        let client = memory_client();
        let config = StoreConfig::default();
        let args = put_args(&["--text", "hello", "--meta", "owner=me", "--encoding", "ascii"]);
        cmd_put(&client, &config, args, &OutputFormat::Text).unwrap();

        let stored = client.get("rabbit", "k").unwrap();
        assert_eq!(stored.value(), &Value::from("hello"));
        assert_eq!(stored.metadata()["owner"], serde_json::json!("me"));
    }

    #[test]
    fn get_writes_output_file() {
        let client = memory_client();
        client.put("rabbit", "k", b"\x01\x02".as_slice(), None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let args = GetArgs {
            bucket: "rabbit".into(),
            key: "k".into(),
            raw: false,
            output: Some(out.clone()),
        };
        cmd_get(&client, args, &OutputFormat::Text).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), vec![1, 2]);
    }

    #[test]
    fn rm_removes_all_keys() {
        let client = memory_client();
        client.put("rabbit", "a", "1", None).unwrap();
        client.put("rabbit", "b", "2", None).unwrap();
        let args = RmArgs {
            bucket: "rabbit".into(),
            keys: vec!["a".into(), "b".into()],
        };
        cmd_rm(&client, args).unwrap();
        assert_eq!(client.transport().object_count(), 0);
        assert_eq!(client.transport().batch_delete_calls().len(), 1);
    }

    #[test]
    fn object_json_encodes_bytes_as_base64() {
        let object = StoredObject::new("rabbit", "k", b"abc".as_slice());
        let json = object_json(&object);
        assert_eq!(json["kind"], "bytes");
        assert_eq!(json["value"], "YWJj");
    }
}
