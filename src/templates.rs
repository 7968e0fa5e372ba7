//! Category-keyed scaffolds written into a fresh challenge directory

use std::path::Path;
use tracing::{debug, info};

use crate::error::WorkspaceResult;
use crate::models::{Category, Challenge};

const PWN_TEMPLATE: &str = include_str!("../templates/pwn_solve.py");
const CRYPTO_TEMPLATE: &str = include_str!("../templates/crypto_solve.py");
const SOLVE_SCRIPT: &str = "solve.py";
const DEFAULT_BINARY: &str = "./chall";

/// Generates starter files for one category
pub trait Scaffold: Send + Sync {
    fn name(&self) -> &'static str;

    /// Populate `challenge.path`, which must already exist
    fn generate(&self, challenge: &Challenge) -> WorkspaceResult<()>;
}

/// pwntools exploit skeleton
pub struct PwnScaffold;

/// pycryptodome solver skeleton
pub struct CryptoScaffold;

/// Categories without a scaffold
pub struct NoScaffold;

impl Scaffold for PwnScaffold {
    fn name(&self) -> &'static str {
        "pwn"
    }

    fn generate(&self, challenge: &Challenge) -> WorkspaceResult<()> {
        let script = PWN_TEMPLATE
            .replace("{{name}}", &challenge.name)
            .replace("{{binary}}", &guess_binary(challenge));
        write_script(&challenge.path.join(SOLVE_SCRIPT), &script)
    }
}

impl Scaffold for CryptoScaffold {
    fn name(&self) -> &'static str {
        "crypto"
    }

    fn generate(&self, challenge: &Challenge) -> WorkspaceResult<()> {
        let script = CRYPTO_TEMPLATE.replace("{{name}}", &challenge.name);
        write_script(&challenge.path.join(SOLVE_SCRIPT), &script)
    }
}

impl Scaffold for NoScaffold {
    fn name(&self) -> &'static str {
        "none"
    }

    fn generate(&self, _challenge: &Challenge) -> WorkspaceResult<()> {
        Ok(())
    }
}

static PWN: PwnScaffold = PwnScaffold;
static CRYPTO: CryptoScaffold = CryptoScaffold;
static NONE: NoScaffold = NoScaffold;

/// Static category -> scaffold mapping
pub fn scaffold_for(category: Category) -> &'static dyn Scaffold {
    match category {
        Category::Pwn => &PWN,
        Category::Crypto => &CRYPTO,
        _ => &NONE,
    }
}

/// Materialize the scaffold for a newly created challenge
pub fn dispatch(challenge: &Challenge) -> WorkspaceResult<()> {
    let scaffold = scaffold_for(challenge.category);
    debug!(
        challenge = %challenge.name,
        scaffold = scaffold.name(),
        "Dispatching scaffold"
    );
    scaffold.generate(challenge)
}

/// First attachment without an extension looks like the target binary
fn guess_binary(challenge: &Challenge) -> String {
    challenge
        .attachments()
        .iter()
        .find(|a| !a.name.contains('.'))
        .map(|a| format!("./{}", a.name))
        .unwrap_or_else(|| DEFAULT_BINARY.to_string())
}

fn write_script(path: &Path, contents: &str) -> WorkspaceResult<()> {
    if path.exists() {
        debug!(path = %path.display(), "Scaffold target exists, leaving it alone");
        return Ok(());
    }

    std::fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }

    info!(path = %path.display(), "Scaffold written");
    Ok(())
}
