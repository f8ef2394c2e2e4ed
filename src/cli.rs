use clap::{ArgAction, Parser};
use std::error::Error;
use std::path::PathBuf;

use crate::app::App;
use crate::config::{self, PlayerConfig, DEFAULT_IP, DEFAULT_PORT, DEFAULT_PREFIX};
use crate::docs;
use crate::media;
use crate::output::{self, DeviceSelector, MidiOutputSink, OutputSink};

#[derive(Parser, Debug)]
#[command(name = "rcmp")]
#[command(about = "Play MIDI files under OSC control")]
#[command(version)]
pub struct Cli {
    /// MIDI file to select, or a directory of MIDI files
    pub file: Option<PathBuf>,

    /// Print information about the selected MIDI file and exit
    #[arg(short = 'i', long)]
    pub info: bool,

    /// List available MIDI outputs and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Display detailed documentation and exit
    #[arg(long)]
    pub docs: bool,

    /// Print the resolved configuration and media list as JSON and exit
    #[arg(long)]
    pub dump: bool,

    /// Select MIDI output, either by name or number
    #[arg(short = 'o', long = "out", default_value = "0")]
    pub out: String,

    /// OSC port number
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// OSC address prefix
    #[arg(long = "osc", default_value = DEFAULT_PREFIX)]
    pub osc: String,

    /// OSC ip address
    #[arg(long, default_value = DEFAULT_IP)]
    pub ip: String,

    /// Exit after playing the initial file, only useful with --play
    #[arg(short = 'x', long = "exit")]
    pub exit: bool,

    /// Start playback of the initial file immediately
    #[arg(short = 'p', long)]
    pub play: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn to_config(&self) -> PlayerConfig {
        PlayerConfig {
            ip: self.ip.clone(),
            port: self.port,
            prefix: config::normalize_prefix(&self.osc),
            output: self.out.clone(),
            play: self.play,
            auto_exit: self.exit,
            ..PlayerConfig::default()
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

pub fn run_cli() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.to_config();
    if cli.docs {
        println!("{}", docs::full_docs(&config.prefix));
        return Ok(());
    }

    let app = App::new(config);
    if let Some(file) = &cli.file {
        app.load_media(file);
    }

    if cli.info {
        println!("{}", media::lock(app.catalog()).selected_file_info());
        return Ok(());
    }

    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&app.snapshot())?);
        return Ok(());
    }

    if cli.list {
        print_outputs(&output::list_output_names()?);
        return Ok(());
    }

    let selector = DeviceSelector::parse(&app.config().output);
    let sink = MidiOutputSink::open(&selector)?;
    println!("🔌 MIDI OUTPUT: '{}'", sink.name());

    app.run(Box::new(sink))?;
    Ok(())
}

pub fn print_outputs(names: &[String]) {
    println!("Available MIDI Outputs:");
    if names.is_empty() {
        println!("❌ No MIDI output ports found!");
    }
    for (i, name) in names.iter().enumerate() {
        println!("\t[{}]  '{}'", i, name);
    }
}
