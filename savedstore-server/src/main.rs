//! The savedstore server binary.

use anyhow::Result;

fn main() -> Result<()> {
    savedstore_server::cli::execute()
}
