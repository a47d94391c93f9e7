//! Interactive client for a PolyVault server
//!
//! Each input line is sent to the server verbatim and the reply is printed.

use clap::Parser;
use polyvault::{Client, Reply};
use std::io::{self, Write};

#[derive(Parser, Debug)]
#[command(name = "polyvault-client", about = "Interactive PolyVault client")]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:6369")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to PolyVault server at {}...", args.addr);
    let mut client = Client::connect(&args.addr).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => print_help(),
            _ => match client.send_line(input).await? {
                Reply::Value(value) => println!("{}", value),
                Reply::Error(e) => println!("(error) {}", e),
            },
        }
    }

    client.close().await?;
    Ok(())
}

fn print_help() {
    println!("Requests are '<operation> <key> [args...]'; quote tokens containing spaces.");
    println!("  String     set <k> <v> | append <k> <v> | get <k>");
    println!("  Hash       hset <k> <field> <v> | hget <k> <field>");
    println!("  List       lpush <k> <v> | rpush <k> <v> | lpop <k> | rpop <k>");
    println!("  Set        sadd <k> <v> | srem <k> <v> | scard <k> | sismember <k> <v>");
    println!("  SortedSet  zadd <k> <field> <v> | zget <k> <field> | zrem <k> <field>");
    println!("             zcard <k> | zrange <k> <start> <stop>");
    println!("  help | quit");
}
