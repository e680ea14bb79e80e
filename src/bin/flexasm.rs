use std::io::Read;
use std::{env, fs, io, process};

use flexasm::assembler::{self, DEFAULT_ARCH};
use flexasm::logging::{error, ConsoleSink};

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} [--arch NAME] [--listing FILE] [input.asm] [output]",
        program
    );
    eprintln!("  input.asm defaults to stdin; output defaults to a.out");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut arch = DEFAULT_ARCH.to_string();
    let mut listing_path: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--arch" => {
                i += 1;
                match args.get(i) {
                    Some(value) => arch = value.clone(),
                    None => usage(&program),
                }
            }
            "--listing" => {
                i += 1;
                match args.get(i) {
                    Some(value) => listing_path = Some(value.clone()),
                    None => usage(&program),
                }
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    if positional.len() > 2 {
        usage(&program);
    }

    let output_path = positional.get(1).cloned().unwrap_or_else(|| "a.out".to_string());

    let mut sink = ConsoleSink;
    let assembled = match positional.first() {
        Some(input_path) => assembler::assemble_from_file(input_path, &arch, &mut sink).unwrap_or_else(|e| {
            error(e.to_string());
            process::exit(3);
        }),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source).unwrap_or_else(|e| {
                error(format!("failed to read assembly source from stdin: {}", e));
                process::exit(2);
            });
            assembler::assemble(&source, &arch, &mut sink).unwrap_or_else(|e| {
                error(e.to_string());
                process::exit(3);
            })
        }
    };

    fs::write(&output_path, &assembled.binary).unwrap_or_else(|e| {
        error(format!("failed to write to output file {:?}: {}", output_path, e));
        process::exit(4);
    });

    if let Some(listing_path) = listing_path {
        fs::write(&listing_path, &assembled.listing).unwrap_or_else(|e| {
            error(format!("failed to write listing file {:?}: {}", listing_path, e));
            process::exit(5);
        });
    }
}
