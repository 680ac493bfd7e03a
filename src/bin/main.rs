use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::debug;

use tolc_eval::descriptor::{self, Descriptor};
use tolc_eval::{guess_parameter_names, EvaluatorOptions, ExpressionEvaluator, GuessMode, ScriptEvaluator, Value};

#[derive(Parser)]
#[command(name = "tolc-eval")]
#[command(about = "Compile and evaluate a Java expression or script")]
#[command(version)]
struct Cli {
    /// Expression (or script with --script) to evaluate
    #[arg(short = 'e', long = "expression", default_value = "total >= 100.0 ? 0.0 : 7.95")]
    expression: String,

    /// Type of the expression, inferred when omitted
    #[arg(long = "et", value_name = "TYPE")]
    expression_type: Option<String>,

    /// Comma-separated parameter names
    #[arg(long = "pn", value_name = "NAMES", value_delimiter = ',', default_value = "total")]
    parameter_names: Vec<String>,

    /// Comma-separated parameter types
    #[arg(long = "pt", value_name = "TYPES", value_delimiter = ',', default_value = "double")]
    parameter_types: Vec<String>,

    /// Comma-separated thrown exception types
    #[arg(long = "te", value_name = "TYPES", value_delimiter = ',')]
    thrown_types: Vec<String>,

    /// Treat the source as a sequence of statements
    #[arg(long)]
    script: bool,

    /// Print the guessed parameter names and exit
    #[arg(long)]
    guess: bool,

    /// Omit source and line information from the generated classes
    #[arg(long)]
    no_debug: bool,

    /// One value per parameter
    #[arg(value_name = "VALUE")]
    values: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.guess {
        let mode = if cli.script { GuessMode::Script } else { GuessMode::Expression };
        let names: Vec<String> = guess_parameter_names(&cli.expression, mode)?.into_iter().collect();
        println!("{}", names.join(", "));
        return Ok(());
    }

    // `--pn ""` declares no parameters
    let names: Vec<String> = cli.parameter_names.iter().filter(|n| !n.is_empty()).cloned().collect();
    let types = cli
        .parameter_types
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| parse_type(t))
        .collect::<Result<Vec<_>>>()?;
    if names.len() != types.len() {
        bail!("Parameter type count and parameter name count do not match");
    }
    if cli.values.len() != names.len() {
        bail!("Parameter value count and parameter name count do not match");
    }
    let args = cli
        .values
        .iter()
        .zip(&types)
        .map(|(text, d)| parse_value(d, text))
        .collect::<Result<Vec<_>>>()?;

    let mut options = EvaluatorOptions::new()
        .with_parameters(names, types)
        .with_thrown_types(cli.thrown_types.iter().map(|t| parse_type(t)).collect::<Result<Vec<_>>>()?);
    options.config = options.config.with_debug(!cli.no_debug);
    if let Some(t) = &cli.expression_type {
        options = options.with_return_type(parse_type(t)?);
    }
    debug!("Evaluating {:?} with {:?}", cli.expression, args);

    let result = if cli.script {
        ScriptEvaluator::new(&cli.expression, options)?.evaluate(&args)?
    } else {
        ExpressionEvaluator::new(&cli.expression, options)?.evaluate(&args)?
    };
    println!("Result = {}", result);
    Ok(())
}

/// `int`, `double[]`, `String`, `java.util.Map`
fn parse_type(name: &str) -> Result<Descriptor> {
    let name = name.trim();
    let (base, dims) = match name.find('[') {
        Some(i) => (&name[..i], name[i..].matches("[]").count()),
        None => (name, 0),
    };
    let qualified = match base {
        "String" | "Object" | "Integer" | "Long" | "Double" | "Boolean" | "Character" | "Math" => {
            format!("java.lang.{}", base)
        }
        other => other.to_string(),
    };
    let mut d = Descriptor::from_class_name(&qualified).with_context(|| format!("Invalid type \"{}\"", name))?;
    for _ in 0..dims {
        d = d.array_of();
    }
    Ok(d)
}

fn parse_value(d: &Descriptor, text: &str) -> Result<Value> {
    let invalid = || anyhow!("Cannot convert \"{}\" to {}", text, d);
    let value = match d.as_str() {
        descriptor::BOOLEAN => Value::Boolean(text.parse().map_err(|_| invalid())?),
        descriptor::BYTE => Value::Byte(text.parse().map_err(|_| invalid())?),
        descriptor::SHORT => Value::Short(text.parse().map_err(|_| invalid())?),
        descriptor::INT => Value::Int(text.parse().map_err(|_| invalid())?),
        descriptor::LONG => Value::Long(text.parse().map_err(|_| invalid())?),
        descriptor::FLOAT => Value::Float(text.parse().map_err(|_| invalid())?),
        descriptor::DOUBLE => Value::Double(text.parse().map_err(|_| invalid())?),
        descriptor::CHAR => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::from(c),
                _ => return Err(invalid()),
            }
        }
        descriptor::STRING | descriptor::OBJECT => Value::string(text),
        _ => return Err(invalid()),
    };
    Ok(value)
}
