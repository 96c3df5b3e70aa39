mod args;
mod editor;
mod view;

use self::{
  args::{Args, Command, LogFormat},
  editor::Prompt,
};
use crate::{
  config::{self, render_document, Config, ConfigFormat},
  reload::Udevadm,
  rules::FileRuleStore,
  session::Session,
  sheet::Sheet,
  usb::CommandLister,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{
  io::{self, Write},
  path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

struct App {
  config: Config,
  session: Session,
}

impl App {
  async fn new(args: &Args) -> Result<Self> {
    let config = match &args.config_file {
      Some(file) => Config::read(file, args.config_format.into())
        .await
        .with_context(|| format!("Failed to read config file {}", file.display()))?,
      None => Config::default(),
    };
    let config = match &args.rules_file {
      Some(rules_file) => config.with_rules_file(rules_file),
      None => config,
    };

    let lister = config.lister();
    let udevadm = config.udevadm();
    let session = Session::open(
      Box::new(FileRuleStore::new(config.rules_file())),
      Box::new(CommandLister::new(&lister.program, lister.args.clone())),
      Box::new(Udevadm::new(&udevadm.program, udevadm.sudo)),
      config.default_mode(),
    )
    .await
    .context("Failed to load rules")?;

    Ok(App { config, session })
  }

  fn show(&self) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Rules file: {}", self.config.rules_file().display())?;
    writeln!(out)?;
    view::write_form(&mut out, self.session.form(), self.session.warnings())?;
    Ok(())
  }

  async fn edit(&mut self) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut prompt = Prompt::new(stdin.lock(), stdout.lock());
    writeln!(prompt.output(), "Rules file: {}", self.session.location().display())?;
    writeln!(prompt.output())?;
    editor::run(&mut self.session, &mut prompt).await
  }

  async fn export(&self, format: ConfigFormat, output: Option<&Path>) -> Result<()> {
    let sheet = Sheet::from(self.session.form());
    let format = format.resolve(output)?;
    let text = render_document(&sheet, format).context("Failed to render sheet")?;

    match output {
      Some(path) => {
        fs::write(path, text)
          .await
          .with_context(|| format!("Failed to write sheet {}", path.display()))?;
        event!(target: "udev-symlink-manager", Level::INFO, path = %path.display(), "Exported sheet");
      }
      None => io::stdout().write_all(text.as_bytes())?,
    }

    Ok(())
  }

  async fn apply(&mut self, format: ConfigFormat, sheet: &Path) -> Result<()> {
    let sheet: Sheet = config::read_document(sheet, format)
      .await
      .with_context(|| format!("Failed to read sheet {}", sheet.display()))?;
    sheet.apply_to(self.session.form_mut())?;

    let outcome = self.session.update_all().await?;
    view::write_outcome(&mut io::stdout(), &outcome)?;
    Ok(())
  }
}

fn init_tracing(log_format: LogFormat) {
  let filter = EnvFilter::from_default_env()
    // Set the base level when not matched by other directives to INFO.
    .add_directive(tracing::Level::INFO.into());

  match log_format {
    LogFormat::Pretty => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    }
    LogFormat::Json => {
      tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_current_span(false)
        .with_span_list(false)
        .init();
    }
  }
}

pub async fn run() -> Result<()> {
  let args = Args::parse();
  init_tracing(args.log_format);

  let mut app = App::new(&args).await?;
  match args.command.unwrap_or(Command::Edit) {
    Command::Show => app.show(),
    Command::Edit => app.edit().await,
    Command::Export { format, output } => {
      app
        .export(format.into(), output.as_ref().map(PathBuf::as_path))
        .await
    }
    Command::Apply { format, sheet } => app.apply(format.into(), &sheet).await,
  }
}
