use std::{
    error::Error,
    fs::File,
    io,
    process::ExitCode,
};

use clap::{Arg, ArgAction, ArgMatches, Command};
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, span, Level};

use ossfs_adapter::{
    config::{AdapterOptions, OssConfig, DEFAULT_PART_SIZE},
    error::FilesystemError,
    model::{
        fs::{StorageAttributes, Visibility, WriteConfig},
        oss::Acl,
    },
    util::object::parse_object_uri,
    Filesystem, OssAdapter, OssClient,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_writer(io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let matches = cli().get_matches();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error_message = %err, error_group = "main");
            eprintln!("ossfs: {}", err);

            let mut cause = err.source();
            while let Some(inner) = cause {
                eprintln!("  caused by: {}", inner);
                cause = inner.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Command {
    let key = |name: &'static str| Arg::new(name).required(true);
    let visibility = Arg::new("visibility")
        .long("visibility")
        .value_parser(["public", "private"]);

    Command::new("ossfs")
        .about("Filesystem-style access to an Alibaba Cloud OSS bucket")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .env("OSS_ENDPOINT")
                .global(true),
        )
        .arg(Arg::new("region").long("region").env("OSS_REGION").global(true))
        .arg(Arg::new("bucket").long("bucket").env("OSS_BUCKET").global(true))
        .arg(
            Arg::new("access_key_id")
                .long("access-key-id")
                .env("OSS_ACCESS_KEY_ID")
                .global(true),
        )
        .arg(
            Arg::new("access_key_secret")
                .long("access-key-secret")
                .env("OSS_ACCESS_KEY_SECRET")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new("part_size")
                .long("part-size")
                .value_parser(clap::value_parser!(usize))
                .help(format!("Multipart threshold in bytes [default: {}]", DEFAULT_PART_SIZE))
                .global(true),
        )
        .arg(
            Arg::new("public_acl")
                .long("public-acl")
                .value_parser(["public-read", "public-read-write"])
                .default_value("public-read")
                .global(true),
        )
        .subcommand(
            Command::new("put")
                .about("Upload a local file, or stdin when no file is given")
                .arg(key("KEY"))
                .arg(Arg::new("FILE"))
                .arg(visibility.clone())
                .arg(Arg::new("content_type").long("content-type")),
        )
        .subcommand(
            Command::new("get")
                .about("Download an object into a local file")
                .arg(key("KEY"))
                .arg(key("FILE")),
        )
        .subcommand(
            Command::new("cat")
                .about("Write an object to stdout")
                .arg(key("KEY")),
        )
        .subcommand(Command::new("rm").about("Delete an object").arg(key("KEY")))
        .subcommand(
            Command::new("rmdir")
                .about("Delete every object under a prefix")
                .arg(key("PREFIX")),
        )
        .subcommand(
            Command::new("mkdir")
                .about("Create a directory (no-op on OSS)")
                .arg(key("PREFIX")),
        )
        .subcommand(
            Command::new("ls")
                .about("List a directory")
                .arg(Arg::new("PREFIX").default_value(""))
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("cp")
                .about("Copy an object server-side")
                .arg(key("SOURCE"))
                .arg(key("DESTINATION"))
                .arg(visibility.clone())
                .arg(
                    Arg::new("keep_visibility")
                        .long("keep-visibility")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("mv")
                .about("Move an object (copy then delete)")
                .arg(key("SOURCE"))
                .arg(key("DESTINATION"))
                .arg(visibility.clone())
                .arg(
                    Arg::new("keep_visibility")
                        .long("keep-visibility")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("stat")
                .about("Show size, content type, modification time and visibility")
                .arg(key("KEY")),
        )
        .subcommand(
            Command::new("acl")
                .about("Show or set the visibility of an object")
                .arg(key("KEY"))
                .arg(Arg::new("VISIBILITY")),
        )
        .subcommand(
            Command::new("exists")
                .about("Exit successfully when the object exists")
                .arg(key("KEY")),
        )
}

fn oss_config(matches: &ArgMatches) -> CliResult<OssConfig> {
    let param = |name: &str| matches.get_one::<String>(name).map(String::as_str);

    let endpoint = param("endpoint").ok_or("missing --endpoint or OSS_ENDPOINT")?;
    let bucket = param("bucket").ok_or("missing --bucket or OSS_BUCKET")?;

    let mut config = OssConfig::new(endpoint, bucket);
    if let Some(region) = param("region") {
        config = config.with_region(region);
    }
    config.access_key_id = param("access_key_id").map(str::to_string);
    config.access_key_secret = param("access_key_secret").map(str::to_string);
    if let Some(part_size) = matches.get_one::<usize>("part_size") {
        config.part_size = *part_size;
    }

    Ok(config)
}

fn run(matches: &ArgMatches) -> CliResult<()> {
    let config = oss_config(matches)?;
    info!(endpoint = %config.endpoint, bucket = %config.bucket, "args");

    let public_acl = matches
        .get_one::<String>("public_acl")
        .map(|acl| acl.parse::<Acl>())
        .transpose()?
        .unwrap_or(Acl::PublicRead);

    let client = OssClient::new(&config)?;
    let adapter = OssAdapter::with_options(
        Box::new(client),
        &config.bucket,
        AdapterOptions::default().with_public_acl(public_acl),
    );
    let fs = Filesystem::new(adapter);

    let (name, sub) = matches
        .subcommand()
        .ok_or("a subcommand is required")?;
    let key = |arg: &str| object_key(&config.bucket, sub, arg);

    match name {
        "put" => {
            let path = key("KEY")?;
            let write_config = write_config(sub)?;
            match sub.get_one::<String>("FILE") {
                Some(file) => {
                    let mut file = File::open(file)?;
                    fs.write_stream_with(&path, &mut file, &write_config)?;
                }
                None => {
                    let mut stdin = io::stdin().lock();
                    fs.write_stream_with(&path, &mut stdin, &write_config)?;
                }
            }
        }
        "get" => {
            let path = key("KEY")?;
            let target = sub.get_one::<String>("FILE").ok_or("missing FILE")?;
            let mut reader = fs.read_stream(&path)?;
            let mut file = File::create(target)?;
            let copied = io::copy(&mut reader, &mut file)?;
            info!(path = %path, target = %target, size = copied, "downloaded");
        }
        "cat" => {
            let mut reader = fs.read_stream(&key("KEY")?)?;
            io::copy(&mut reader, &mut io::stdout().lock())?;
        }
        "rm" => fs.delete(&key("KEY")?)?,
        "rmdir" => fs.delete_directory(&key("PREFIX")?)?,
        "mkdir" => fs.create_directory(&key("PREFIX")?)?,
        "ls" => {
            let entries = fs.list_contents(&key("PREFIX")?, sub.get_flag("recursive"))?;
            for entry in entries {
                println!("{}", listing_line(&entry));
            }
        }
        "cp" => fs.copy_with(&key("SOURCE")?, &key("DESTINATION")?, &write_config(sub)?)?,
        "mv" => fs.move_file_with(&key("SOURCE")?, &key("DESTINATION")?, &write_config(sub)?)?,
        "stat" => {
            let path = key("KEY")?;
            println!("path:          {}", path);
            println!("size:          {}", fs.file_size(&path)?);
            println!("content-type:  {}", fs.mime_type(&path)?);
            println!("last-modified: {}", fs.last_modified(&path)?.format(&Rfc3339)?);
            println!("visibility:    {}", fs.visibility(&path)?);
        }
        "acl" => {
            let path = key("KEY")?;
            match sub.get_one::<String>("VISIBILITY") {
                Some(visibility) => fs.set_visibility(&path, visibility)?,
                None => println!("{}", fs.visibility(&path)?),
            }
        }
        "exists" => {
            let path = key("KEY")?;
            if !fs.file_exists(&path)? {
                return Err(format!("no such object: {}", path).into());
            }
            println!("{}", path);
        }
        other => return Err(format!("unknown subcommand: {}", other).into()),
    }

    Ok(())
}

/// Resolves a positional argument to an object key, accepting `oss://bucket/key`.
fn object_key(bucket: &str, matches: &ArgMatches, arg: &str) -> Result<String, FilesystemError> {
    let raw = matches
        .get_one::<String>(arg)
        .map(String::as_str)
        .unwrap_or_default();

    match parse_object_uri(raw) {
        (Some(other), _) if other != bucket => Err(FilesystemError::InvalidInput(format!(
            "{} points at bucket {}, configured bucket is {}",
            raw, other, bucket
        ))),
        (_, key) => Ok(key.to_string()),
    }
}

fn write_config(matches: &ArgMatches) -> CliResult<WriteConfig> {
    let mut config = WriteConfig::default();

    if let Some(visibility) = matches.get_one::<String>("visibility") {
        config = config.with_visibility(visibility.parse::<Visibility>()?);
    }

    if let Ok(Some(content_type)) = matches.try_get_one::<String>("content_type") {
        config = config.with_mime_type(content_type);
    }

    if let Ok(Some(true)) = matches.try_get_one::<bool>("keep_visibility") {
        config = config.retaining_visibility();
    }

    Ok(config)
}

fn listing_line(entry: &StorageAttributes) -> String {
    match entry {
        StorageAttributes::Directory(dir) => format!("{:>12}  {}/", "DIR", dir.path),
        StorageAttributes::File(file) => format!(
            "{:>12}  {}",
            file.file_size.unwrap_or_default(),
            file.path
        ),
    }
}
