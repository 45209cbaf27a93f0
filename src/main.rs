use lemmy_cache::app::RunOptions;

const HELP: &str = "lemmy-cache: print a Lemmy feed through the client cache.\n\n  --feed [community]   Show the first feed page (front page when omitted)\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if handle_info_flags(&args) {
        return;
    }

    let options = match parse_run_options(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = lemmy_cache::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_info_flags(args: &[String]) -> bool {
    let mut saw_flag = false;
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("lemmy-cache {}", lemmy_cache::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}

fn parse_run_options(args: &[String]) -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--feed" => {
                if let Some(community) = iter.next_if(|next| !next.starts_with('-')) {
                    options.community = Some(community.clone());
                }
            }
            other => return Err(format!("unrecognized argument {other:?}")),
        }
    }
    Ok(options)
}
