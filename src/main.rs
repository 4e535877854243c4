//! moonlog - A static blog generator scripted with Lua.

mod app;
mod build;
mod cli;
mod config;
mod content;
mod init;
mod logger;
mod markup;
mod render;
mod script;
mod serve;
mod utils;

use anyhow::Result;
use app::{App, Setup};
use build::{build_site, clean_site};
use clap::Parser;
use cli::{Cli, Commands};
use content::{Content, StatusFilter};
use render::Renderer;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root.as_path();

    match cli.command {
        Commands::Site { path } => init::new_site(&root.join(path)),
        Commands::New => {
            let setup = Setup::open(root)?;
            init::new_entry(&setup.config).map(|_| ())
        }
        Commands::Clean => {
            let setup = Setup::open(root)?;
            clean_site(&setup.config).map(|_| ())
        }
        Commands::Build { clean } => {
            let app = App::open(root, &StatusFilter::published())?;
            if clean {
                clean_site(&app.config)?;
            }
            let renderer = Renderer::new(app.config.theme_path());
            let result = build_site(&app, &renderer);
            app.pool.shutdown();
            result
        }
        Commands::Serve { port } => {
            let setup = Setup::open(root)?;
            let app = Arc::new(setup.with_content(Content::default()));
            serve::serve_site(&app, port, None)
        }
        Commands::Preview { path, port } => {
            let setup = Setup::open(root)?;
            let app = Arc::new(setup.with_content(Content::default()));
            serve::serve_site(&app, port, Some(path))
        }
    }
}
