use anyhow::Context;
use lazy_static::lazy_static;
use ratebook::{
    decompose, Config, Event, Notebook, RatingDraft, RestaurantDraft, Score, Session,
};
use regex::Regex;
use std::time::Duration;
use structopt::StructOpt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::timeout,
};
use tracing::info;

use crate::run_impl;

/// How long the shell waits for the notebook to go quiet after a command.
const SETTLE: Duration = Duration::from_millis(30);

const HELP: &str = "\
commands:
  add <name>                    save a restaurant
  rate <id> <score> <comment>   rate a restaurant, score 1 to 5 in steps of 0.5
  delete <id>                   delete a restaurant (its ratings stay behind)
  list                          show everything
  help                          show this
  quit                          leave
ids can be shortened to any unique prefix";

#[derive(StructOpt)]
pub struct Shell {
    /// Namespace for this notebook, overrides RATEBOOK_APP_ID
    #[structopt(long)]
    app_id: Option<String>,

    /// Sign in as this user instead of anonymously, overrides RATEBOOK_AUTH_TOKEN
    #[structopt(long)]
    user: Option<String>,
}

enum Input {
    Add(String),
    Rate {
        id: String,
        score: String,
        comment: String,
    },
    Delete(String),
    List,
    Help,
    Quit,
    Blank,
    Unknown(String),
}

fn parse(line: &str) -> Input {
    lazy_static! {
        static ref RE_ADD: Regex = Regex::new(r"^add\s+(.+)$").unwrap();
        static ref RE_RATE: Regex = Regex::new(r"^rate\s+(\S+)\s+(\S+)\s+(.+)$").unwrap();
        static ref RE_DELETE: Regex = Regex::new(r"^delete\s+(\S+)$").unwrap();
    };

    let line = line.trim();
    if let Some(caps) = RE_ADD.captures(line) {
        return Input::Add(caps[1].to_string());
    }
    if let Some(caps) = RE_RATE.captures(line) {
        return Input::Rate {
            id: caps[1].to_string(),
            score: caps[2].to_string(),
            comment: caps[3].to_string(),
        };
    }
    if let Some(caps) = RE_DELETE.captures(line) {
        return Input::Delete(caps[1].to_string());
    }
    match line {
        "" => Input::Blank,
        "list" | "ls" => Input::List,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

fn short(id: &str) -> &str {
    id.get(..6).unwrap_or(id)
}

/// Let pending changes arrive before the next prompt.
async fn settle(notebook: &mut Notebook) {
    while let Ok(Some(event)) = timeout(SETTLE, notebook.next_event()).await {
        if let Event::SubscriptionFailed {
            collection,
            message,
        } = event
        {
            println!("! {} stopped updating: {}", collection, message);
        }
    }
}

fn print_notebook(notebook: &Notebook) {
    let restaurants = notebook.restaurants();
    println!("restaurants ({})", restaurants.len());
    if restaurants.is_empty() {
        println!("  none yet, try: add <name>");
    }
    for restaurant in restaurants {
        println!(
            "  {} {:.1} ({})  {}  [{}]",
            decompose(restaurant.summary.average),
            restaurant.summary.average,
            restaurant.summary.count,
            restaurant.name,
            short(&restaurant.id),
        );
        if let Some(view) = notebook.ratings(&restaurant.id) {
            for rating in &view.ratings {
                println!(
                    "      {} {}  {}",
                    rating.stars(),
                    rating.created_at.format("%Y-%m-%d"),
                    rating.comment,
                );
            }
        }
    }
}

async fn execute(notebook: &Notebook, input: Input) -> Result<(), ratebook::Error> {
    match input {
        Input::Add(name) => {
            let id = notebook.add_restaurant(&RestaurantDraft::new(&name)?).await?;
            println!("added {} [{}]", name.trim(), short(&id));
        }
        Input::Rate { id, score, comment } => {
            let score: Score = score.parse()?;
            let draft = RatingDraft::new(score, &comment)?;
            let restaurant = notebook.resolve(&id)?.name.clone();
            notebook.add_rating(&id, &draft).await?;
            println!("rated {} {}", restaurant, score);
        }
        Input::Delete(id) => {
            let restaurant = notebook.resolve(&id)?.clone();
            notebook.delete_restaurant(&restaurant.id).await?;
            println!("deleted {}", restaurant.name);
        }
        Input::List => print_notebook(notebook),
        Input::Help => println!("{}", HELP),
        Input::Unknown(line) => println!("? unknown command {:?}, try help", line),
        Input::Blank | Input::Quit => {}
    }
    Ok(())
}

impl Shell {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load()?;
        if let Some(app_id) = &self.app_id {
            config.app_id = app_id.clone();
        }
        if let Some(user) = &self.user {
            config.auth_token = Some(user.clone());
        }
        Ok(config)
    }
}

run_impl!(Shell, self, _ser, {
    let config = self.config()?;
    let (session, _store) = Session::in_memory(&config)?;
    let mut notebook = Notebook::open(&session)
        .await
        .context("could not open notebook")?;
    info!(user = %session.user_id(), "shell ready");

    settle(&mut notebook).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = parse(&line);
        if let Input::Quit = input {
            break;
        }
        if let Err(e) = execute(&notebook, input).await {
            /* nothing typed is lost: the line can simply be sent again */
            println!("! {}", e);
        }
        settle(&mut notebook).await;
    }

    notebook.close();
    session.end();
});
