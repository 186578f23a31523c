//! fieldvault: operator tooling for the field encryption key registry.
//!
//! Usage:
//!   fieldvault keygen [--name <name>] [--bits <bits>]
//!   fieldvault list
//!   fieldvault revoke --id <id> [--reason <text>]
//!   fieldvault encrypt --value <text>
//!   fieldvault decrypt --alg <tag> --payload <payload>
//!   fieldvault key-ref

use std::process::ExitCode;
use std::sync::Arc;

use fieldvault::{FieldRouter, KeyId, KeyRegistry, LogFormat, PolicyHandle, Settings};
use fieldvault_envelope::oaep::DEFAULT_RSA_BITS;
use fieldvault_keystore::{AuditSink, FileAuditSink, SqliteBackend, TracingAuditSink};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    let result = match args[1].as_str() {
        "keygen" => cmd_keygen(&settings, &args[2..]),
        "list" => cmd_list(&settings),
        "revoke" => cmd_revoke(&settings, &args[2..]),
        "encrypt" => cmd_encrypt(&settings, &args[2..]),
        "decrypt" => cmd_decrypt(&settings, &args[2..]),
        "key-ref" => cmd_key_ref(&settings),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("fieldvault {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fieldvault=info,fieldvault_keystore=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().with_target(true).init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn print_usage() {
    eprintln!(
        r#"fieldvault - field-level encryption key management

USAGE:
    fieldvault <COMMAND> [OPTIONS]

COMMANDS:
    keygen      Generate a key pair and make it active
    list        List registry keys
    revoke      Revoke a key
    encrypt     Encrypt a value with the configured write algorithm
    decrypt     Decrypt a stored payload
    key-ref     Print the symmetric key identifier

EXAMPLES:
    # Rotate to a fresh RSA-2048 key
    fieldvault keygen --name payroll

    # Encrypt under the current policy
    FIELDVAULT_WRITE_ALGORITHM=HYBRID fieldvault encrypt --value 12345678901

    # Decrypt a stored value
    fieldvault decrypt --alg HYBRID --payload '{{"v":1,...}}'

    # Retire a compromised key
    fieldvault revoke --id 3 --reason "leaked backup"

ENVIRONMENT:
    FIELDVAULT_AES_KEY          base64 16-byte key for AES
    FIELDVAULT_MASTER_SECRET    base64 32-byte secret wrapping private keys
    FIELDVAULT_KEYSTORE_PATH    SQLite key registry (default ./fieldvault-keys.db)
    FIELDVAULT_WRITE_ALGORITHM  AES | RSA | HYBRID
    FIELDVAULT_AUDIT_LOG        JSON-lines audit file
    FIELDVAULT_LOG_FORMAT       pretty | json

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn open_registry(settings: &Settings) -> Result<Option<Arc<KeyRegistry>>, Box<dyn std::error::Error>> {
    let Some(master) = settings.master_secret()? else {
        return Ok(None);
    };
    let storage = Arc::new(SqliteBackend::open(&settings.keystore_path)?);
    let audit: Arc<dyn AuditSink> = match &settings.audit_log {
        Some(path) => Arc::new(FileAuditSink::new(path)),
        None => Arc::new(TracingAuditSink),
    };
    Ok(Some(Arc::new(
        KeyRegistry::new(storage, audit, master).with_actor("cli"),
    )))
}

fn require_registry(settings: &Settings) -> Result<Arc<KeyRegistry>, Box<dyn std::error::Error>> {
    open_registry(settings)?.ok_or_else(|| "FIELDVAULT_MASTER_SECRET is not set".into())
}

fn build_router(settings: &Settings) -> Result<FieldRouter, Box<dyn std::error::Error>> {
    let mut builder = FieldRouter::builder(PolicyHandle::new(settings.policy));
    if let Some(cipher) = settings.symmetric_cipher()? {
        builder = builder.symmetric(cipher);
    }
    if let Some(registry) = open_registry(settings)? {
        builder = builder.registry(registry);
    }
    Ok(builder.build())
}

/// Value following a flag.
fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {}", flag))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_keygen(settings: &Settings, args: &[String]) -> CliResult {
    let mut name = String::from("default");
    let mut bits = DEFAULT_RSA_BITS;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => name = flag_value(args, &mut i, "--name")?.to_owned(),
            "--bits" | "-b" => {
                bits = flag_value(args, &mut i, "--bits")?
                    .parse()
                    .map_err(|_| "bits must be a number")?;
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    let registry = require_registry(settings)?;
    let key = registry.generate_keypair(&name, "RSA", bits)?;

    eprintln!("Generated key:");
    eprintln!("  Id:         {}", key.id);
    eprintln!("  Name:       {}", key.name);
    eprintln!("  Algorithm:  {}", key.algorithm);
    eprintln!("  Status:     {}", key.status.as_str());
    Ok(())
}

fn cmd_list(settings: &Settings) -> CliResult {
    let registry = require_registry(settings)?;
    let keys = registry.list_keys()?;

    if keys.is_empty() {
        eprintln!("No keys. Run `fieldvault keygen` first.");
        return Ok(());
    }

    println!("{:<6} {:<10} {:<10} {:<20} CREATED", "ID", "STATUS", "ALGORITHM", "NAME");
    for key in keys {
        println!(
            "{:<6} {:<10} {:<10} {:<20} {}",
            key.id,
            key.status.as_str(),
            key.algorithm,
            key.name,
            key.created_at.to_rfc3339()
        );
    }
    Ok(())
}

fn cmd_revoke(settings: &Settings, args: &[String]) -> CliResult {
    let mut id: Option<i64> = None;
    let mut reason: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--id" => {
                id = Some(
                    flag_value(args, &mut i, "--id")?
                        .parse()
                        .map_err(|_| "id must be a number")?,
                );
            }
            "--reason" | "-r" => reason = Some(flag_value(args, &mut i, "--reason")?.to_owned()),
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }
    let id = KeyId::new(id.ok_or("--id is required")?);

    let registry = require_registry(settings)?;
    let key = registry.revoke(id, reason.as_deref())?;
    eprintln!("Revoked key {} ({})", key.id, key.name);
    if registry.get_active_key().is_err() {
        eprintln!("warning: no active key; run `fieldvault keygen` before writing RSA or HYBRID values");
    }
    Ok(())
}

fn cmd_encrypt(settings: &Settings, args: &[String]) -> CliResult {
    let mut value: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--value" | "-v" => value = Some(flag_value(args, &mut i, "--value")?.to_owned()),
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }
    let value = value.ok_or("--value is required")?;

    let router = build_router(settings)?;
    let encrypted = router.encrypt_for_write(&value)?;

    eprintln!("algorithm: {}", encrypted.algorithm);
    eprintln!("key_ref:   {}", encrypted.key_ref);
    println!("{}", encrypted.payload);
    Ok(())
}

fn cmd_decrypt(settings: &Settings, args: &[String]) -> CliResult {
    let mut alg: Option<String> = None;
    let mut payload: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--alg" | "-a" => alg = Some(flag_value(args, &mut i, "--alg")?.to_owned()),
            "--payload" | "-p" => payload = Some(flag_value(args, &mut i, "--payload")?.to_owned()),
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }
    let payload = payload.ok_or("--payload is required")?;

    let router = build_router(settings)?;
    println!("{}", router.decrypt_strict(alg.as_deref(), &payload)?);
    Ok(())
}

fn cmd_key_ref(settings: &Settings) -> CliResult {
    let cipher = settings
        .symmetric_cipher()?
        .ok_or("FIELDVAULT_AES_KEY is not set")?;
    println!("{}", cipher.key_ref());
    Ok(())
}
