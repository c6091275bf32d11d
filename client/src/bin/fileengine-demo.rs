use anyhow::Context;
use fileengine_client::{
    AclEntry, AppliesTo, ClientConfig, FileUid, ManagedFiles, Permissions, Principal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("Usage: fileengine-demo [--address host:port] [--user name]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --address   FileEngine service address (default localhost:50051)");
    eprintln!("  --user      Username to act as (default root)");
    eprintln!("  --version   Print version and exit");
    eprintln!("  --help      Print this help message");
}

struct Options {
    config: ClientConfig,
    user: String,
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        config: ClientConfig::default(),
        user: "root".to_string(),
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" => {
                println!("fileengine-demo {}", VERSION);
                return Ok(None);
            }
            "--help" => {
                print_usage();
                return Ok(None);
            }
            "--address" => {
                let address = iter.next().context("--address needs a value")?;
                options.config = ClientConfig::from_address(address)?;
            }
            "--user" => {
                options.user = iter.next().context("--user needs a value")?.clone();
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
    }

    Ok(Some(options))
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!("fileengine-demo {} connecting to {}", VERSION, options.config.address());
    let files = ManagedFiles::connect(
        &options.user,
        ["admin", "superuser"],
        ["read", "write", "delete", "admin"],
        &options.config,
    )
    .context("Failed to open FileEngine session")?;

    let result = run(&files);
    files.close();
    result
}

fn run(files: &ManagedFiles) -> anyhow::Result<()> {
    let root_dir = files.mkdir(&FileUid::root(), "demo_root")?;
    println!("Created root directory with UID: {root_dir}");

    let sub_dir = files.mkdir(&root_dir, "subdir")?;
    println!("Created subdirectory with UID: {sub_dir}");

    let file_uid = files.touch(&sub_dir, "demo_file.txt")?;
    println!("Created file with UID: {file_uid}");

    let content = b"This is a demo file for the FileEngine Rust client.";
    let version = files.put(&file_uid, &content[..])?;
    println!("Written content with version: {version}");

    let read_back = files.get(&file_uid, None)?;
    println!("Read content: {}", String::from_utf8_lossy(&read_back));

    for entry in files.list_dir(&root_dir)? {
        println!("  {:?} {} ({})", entry.file_type, entry.name, entry.uid);
    }

    for revision in files.revisions(&file_uid)? {
        println!("Revision {} by {}", revision.version, revision.user);
    }

    let info = files.stat(&file_uid)?;
    println!(
        "File {} size {} modified {} mode {}",
        info.name,
        info.size,
        info.modified_at,
        info.permission_string()
    );

    println!("\n--- Permission Operations ---");
    let entry = AclEntry::new(
        Principal::User("demo_user".to_string()),
        Permissions::READ,
        AppliesTo::File,
    );
    let entries = files.grant(&file_uid, &entry)?;
    println!("Granted read permission, {} entries in force", entries.len());

    let allowed = files.check_permission(&file_uid, Permissions::READ)?;
    println!("Session user has read permission: {allowed}");

    let entries = files.revoke(&file_uid, &entry)?;
    println!("Revoked read permission, {} entries in force", entries.len());

    println!("\n--- Status Operations ---");
    let usage = files.storage_usage()?;
    println!(
        "Storage usage: {} of {} bytes ({:.1}%)",
        usage.used_space, usage.total_space, usage.usage_percentage
    );

    files.trigger_sync()?;
    println!("Sync triggered");

    let versions = files.list_versions(&file_uid)?;
    if let Some(previous) = versions.get(1) {
        let restored = files.restore_to_version(&file_uid, previous)?;
        println!("Restored to version: {restored}");
    }

    files.purge_old_versions(&file_uid, 2)?;
    println!("Purged old versions, keeping 2");

    println!("\nDemo completed successfully!");
    Ok(())
}
