//! A simple CLI tool for browsing the questions on a running server.
//! This uses the same filtering and sorting as the web client, so the listing
//! matches what users see.

use clap::{Arg, ArgAction, ArgMatches, Command};

use qna_backend::listing::{self, QuestionFilter, SortOrder};
use qna_backend::model::api::question::QuestionSummary;

const PROGRAM_NAME: &str = "question-browser";

const ABOUT_TEXT: &str = "List the questions on a Q&A server.

EXIT CODES:
     0: Listing printed.
     1: Could not fetch the listing.
     2: Invalid arguments.";

const SERVER: &str = "SERVER";
const SEARCH: &str = "SEARCH";
const TAG: &str = "TAG";
const SORT: &str = "SORT";
const TAGS: &str = "TAGS";

const SERVER_HELP: &str = "Base URL of the server, e.g. http://localhost:8000";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(SERVER)
                .help(SERVER_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(SEARCH)
                .long("search")
                .short('s')
                .help("Only show questions whose title, body or tags contain this text")
                .action(ArgAction::Set)
                .default_value(""),
        )
        .arg(
            Arg::new(TAG)
                .long("tag")
                .short('t')
                .help("Only show questions with exactly this tag")
                .action(ArgAction::Set)
                .default_value(""),
        )
        .arg(
            Arg::new(SORT)
                .long("sort")
                .help("One of newest, oldest, votes, answers or views")
                .action(ArgAction::Set)
                .default_value("newest"),
        )
        .arg(
            Arg::new(TAGS)
                .long("tags")
                .help("Print the popular tags instead of the questions")
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// The arguments were well-formed but meaningless.
    Usage(String),
    /// Fetching or decoding the listing failed.
    Fetch(reqwest::Error),
}

/// Fetch every question summary from the server.
fn fetch(server: &str) -> Result<Vec<QuestionSummary>, Error> {
    let url = format!("{}/api/questions", server.trim_end_matches('/'));
    reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(Error::Fetch)
}

/// Render one listing line, with the body excerpt underneath.
fn render(question: &QuestionSummary) -> String {
    let author = question
        .author
        .as_ref()
        .map(|author| author.username.as_str())
        .unwrap_or("[deleted]");
    format!(
        "[{:+}] {} ({} answer{}, {} view{}) by {} [{}]\n    {}",
        question.votes,
        question.title,
        question.answer_count,
        if question.answer_count != 1 { "s" } else { "" },
        question.views,
        if question.views != 1 { "s" } else { "" },
        author,
        question.tags.join(", "),
        listing::excerpt(&question.body)
    )
}

/// Produce the lines to print from a fetched listing.
fn browse(questions: Vec<QuestionSummary>, args: &ArgMatches) -> Result<Vec<String>, Error> {
    // Arguments with defaults are guaranteed to be present.
    let search: &String = args.get_one(SEARCH).unwrap();
    let tag: &String = args.get_one(TAG).unwrap();
    let sort: &String = args.get_one(SORT).unwrap();

    if args.get_flag(TAGS) {
        return Ok(listing::popular_tags(&questions));
    }

    let order = sort
        .parse::<SortOrder>()
        .map_err(|e| Error::Usage(e.to_string()))?;
    let filter = QuestionFilter::new(search.as_str(), tag.as_str());
    let shown = listing::view(questions, &filter, order);
    if shown.is_empty() {
        return Ok(vec!["No questions found.".to_string()]);
    }
    Ok(shown.iter().map(render).collect())
}

/// Fetch and print the listing, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let server: &String = args.get_one(SERVER).unwrap(); // Required argument is guaranteed to be present.
    let result = fetch(server).and_then(|questions| browse(questions, args));
    match result {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            0
        }
        Err(Error::Fetch(err)) => {
            println!("Could not fetch questions: {}", err);
            1
        }
        Err(Error::Usage(msg)) => {
            println!("{}", msg);
            2
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
