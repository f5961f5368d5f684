use clap::{Parser, Subcommand};

/// This is a program to build survey forms, fill them out and summarize the responses.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A configuration file in JSON format. See the manual for the
    /// accepted options.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, default 'forms') Where the form documents are stored. Setting this
    /// option overrides the directory that may be specified with the --config option.
    #[clap(long, value_parser)]
    pub forms_dir: Option<String>,

    /// (directory, default 'responses') Where the responses are stored. Setting this
    /// option overrides the directory that may be specified with the --config option.
    #[clap(long, value_parser)]
    pub responses_dir: Option<String>,

    /// If passed as an argument, a response can only be submitted when all the questions
    /// are answered.
    #[clap(long, takes_value = false)]
    pub strict: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Creates a new form, by answering questions or from a draft file.
    Create {
        /// (file path, optional) A form document in JSON format to save instead of asking.
        #[clap(short, long, value_parser)]
        input: Option<String>,
    },
    /// Lists the forms and the number of responses for each of them.
    List,
    /// Fills out a form, one question at a time.
    Respond {
        /// The name of the form, as shown by the list command.
        #[clap(short, long, value_parser)]
        form: String,
    },
    /// Summarizes the responses of a form.
    Results {
        /// The name of the form, as shown by the list command.
        #[clap(short, long, value_parser)]
        form: String,

        /// (most, least or alpha) The order of the answers of the text questions.
        #[clap(long, value_parser)]
        sort: Option<String>,

        /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON
        /// format to the given location instead of being printed as text.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference summary in JSON format. If provided, surveyctl will
        /// check that the computed summary matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Copies the raw responses of a form in CSV format.
    Export {
        /// The name of the form, as shown by the list command.
        #[clap(short, long, value_parser)]
        form: String,

        /// (file path or 'stdout') Where to copy the responses. Defaults to the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
