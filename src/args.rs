use clap::{Parser, Subcommand};

/// Lap time board for karting events.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the board. The data files are resolved
    /// relative to its directory. Without it, the defaults apply in the current directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// The admin password, required by the admin commands when the configuration sets one.
    #[clap(long, value_parser)]
    pub password: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Records a lap.
    Submit {
        #[clap(long, value_parser)]
        name: String,
        /// The class of the driver. May be omitted when the board does not require one.
        #[clap(long, value_parser, default_value = "")]
        class: String,
        #[clap(long, value_parser)]
        lap: u32,
        #[clap(long, value_parser, default_value_t = 0)]
        minutes: u64,
        #[clap(long, value_parser)]
        seconds: u64,
        #[clap(long, value_parser, default_value_t = 0)]
        millis: u64,
        /// (seconds) Added to the lap time. When 0, the bonus registry value is used.
        #[clap(long, value_parser, default_value_t = 0.0)]
        bonus: f64,
        /// (seconds) Added to the lap time.
        #[clap(long, value_parser, default_value_t = 0.0)]
        penalty: f64,
    },
    /// Prints the ranking.
    Show {
        /// Only the records of this class.
        #[clap(long, value_parser)]
        class: Option<String>,
        /// (default text) text, csv, html, markdown, json or pdf.
        #[clap(long, value_parser, default_value = "text")]
        format: String,
        /// (file path, 'auto' or empty) Where to write the ranking. 'auto' derives the file
        /// name from the title. Defaults to the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference rendering. If provided, the output is compared with it and
        /// any difference is an error.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Exports the ranking to a file format.
    Export {
        /// csv, html, markdown, json or pdf.
        #[clap(long, value_parser)]
        format: String,
        #[clap(long, value_parser)]
        class: Option<String>,
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// (admin) Changes the title of the board.
    Title {
        #[clap(value_parser)]
        text: String,
    },
    /// (admin) Deletes the record at the given position of the overall ranking, as shown in
    /// the `position` column.
    Delete {
        #[clap(value_parser)]
        position: usize,
    },
    /// (admin) Deletes all the records, restores the default title and removes the backup.
    Reset,
    /// (admin) Saves a copy of the current table to the backup file.
    Backup,
    /// (admin) Replaces the table with an uploaded CSV or Excel (.xlsx) file.
    Import {
        #[clap(value_parser)]
        file: String,
        /// When using an Excel file, the name of the worksheet to use (default: the first one).
        #[clap(long, value_parser)]
        worksheet: Option<String>,
    },
    /// (admin) Reads the table again from the files.
    Reload,
}

impl Command {
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Command::Title { .. }
                | Command::Delete { .. }
                | Command::Reset
                | Command::Backup
                | Command::Import { .. }
                | Command::Reload
        )
    }
}
