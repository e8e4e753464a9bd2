//! Reads JSON from stdin, parses it with `JSON.parse` into a fresh heap
//! and prints it back with `JSON.stringify`.
//!
//! ```console
//! $ echo '{"b": [1, 2], "a": null}' | cargo run -q --bin sljson -- --indent 2
//! {
//!   "b": [
//!     1,
//!     2
//!   ],
//!   "a": null
//! }
//! ```
//!
//! Flags: `--indent N`, `--strict`, `--config options.json`
//! (a serialized [`slothjs_core::Options`]).

use std::fs;
use std::io::{
    self,
    Read,
};
use std::process;

use atty::Stream;

use slothjs_core::builtin::{
    json_parse,
    json_stringify,
};
use slothjs_core::{
    Heap,
    JSString,
    JSValue,
    Options,
};

struct Args {
    options: Options,
    indent: JSValue,
}

fn usage() -> ! {
    eprintln!("usage: sljson [--indent N] [--strict] [--config options.json]");
    process::exit(2)
}

fn parse_args() -> io::Result<Args> {
    let mut options = Options::default();
    let mut indent = JSValue::Undefined;
    let mut strict = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--indent" => {
                let width = args.next().and_then(|n| n.parse::<u32>().ok()).unwrap_or_else(|| usage());
                indent = JSValue::from(width);
            }
            "--strict" => strict = true,
            "--config" => {
                let path = args.next().unwrap_or_else(|| usage());
                let text = fs::read_to_string(&path)?;
                options = serde_json::from_str(&text).map_err(io::Error::from)?;
            }
            _ => usage(),
        }
    }
    options.strict |= strict;
    Ok(Args { options, indent })
}

fn main() -> io::Result<()> {
    let args = parse_args()?;
    if atty::is(Stream::Stdin) {
        eprintln!("Enter JSON, then Ctrl-D:");
    }

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let mut heap = Heap::with_options(args.options);
    let value = match json_parse(&mut heap, &JSString::from(input.as_str())) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    match json_stringify(&mut heap, &value, &args.indent) {
        Ok(Some(text)) => println!("{}", text),
        Ok(None) => println!("undefined"),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
    Ok(())
}
