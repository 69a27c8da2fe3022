//! Checks whether the persisted session may open a portal route.
//!
//! ```text
//! ward-check [--store FILE] [--require ROLE]... [--login legacy|new EMAIL PASSWORD] [--logout] PATH
//! ```
//!
//! Reads the backend location from `MEDGATE_API_URL` (see
//! `EngineConfig::from_env`). The session file plays the part of the
//! browser's storage: it survives between runs until a logout or a
//! rejected token clears it.

use medgate::prelude::*;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

struct Args {
    store: String,
    required: Vec<Role>,
    login: Option<(SourceKind, LoginRequest)>,
    logout: bool,
    path: String,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        store: "medgate-session.json".into(),
        required: Vec::new(),
        login: None,
        logout: false,
        path: String::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--store" => parsed.store = args.next().ok_or("--store needs a file")?,
            "--require" => {
                let role = args.next().ok_or("--require needs a role")?;
                let role: Role = role.parse().map_err(|e| format!("{e}"))?;
                parsed.required.push(role);
            }
            "--login" => {
                let source = args.next().ok_or("--login needs a source")?;
                let email = args.next().ok_or("--login needs an email")?;
                let password = args.next().ok_or("--login needs a password")?;
                let source: SourceKind = source.parse().map_err(|e| format!("{e}"))?;
                parsed.login = Some((source, LoginRequest { email, password }));
            }
            "--logout" => parsed.logout = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            other => parsed.path = other.to_owned(),
        }
    }

    if parsed.path.is_empty() && !parsed.logout {
        return Err("missing PATH".into());
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    init_logging("info");

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("ward-check: {msg}");
            eprintln!(
                "usage: ward-check [--store FILE] [--require ROLE]... \
                 [--login legacy|new EMAIL PASSWORD] [--logout] PATH"
            );
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "ward-check failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), MedgateError> {
    let engine = SessionEngine::builder()
        .config(EngineConfig::from_env()?)
        .store(FileStore::open(&args.store)?)
        .build_http()?;

    if args.logout {
        engine.sign_out()?;
        println!("signed out");
        if args.path.is_empty() {
            return Ok(());
        }
    }

    if let Some(source) = engine.bootstrap() {
        tracing::info!(%source, "persisted session found");
    }

    if let Some((source, request)) = &args.login {
        let user = engine.login(*source, request).await?;
        println!("signed in as {} ({})", user.name, user.role);
    }

    let mount = engine.mount(args.path.as_str());
    let nav = engine.navigate(&mount, &args.required).await;
    tracing::debug!(verification = ?nav.verification, "verification settled");

    match &nav.decision {
        GuardDecision::Allow => {
            let who = engine
                .identity()
                .user
                .map(|u| format!("{} ({})", u.name, u.role))
                .unwrap_or_default();
            println!("allow {} for {who}", args.path);
        }
        GuardDecision::Loading => println!("loading"),
        GuardDecision::Forbidden { role } => println!("forbidden for {role}"),
        redirect => {
            let target = engine.location(redirect).unwrap_or_default();
            println!("redirect {target}");
        }
    }
    Ok(())
}
