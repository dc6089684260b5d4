pub(crate) mod commands;
pub(crate) mod exam_view;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::schemas::admin::{PageRequest, StudentStatus};
use crate::schemas::exam::{DifficultyLevel, OptionLetter};

pub(crate) const USAGE: &str = "\
usage: exam-portal <command> [args]

  login [--admin] <email> <password>
  logout
  whoami
  register-student <full-name> <email> <password> [--phone P] [--dob YYYY-MM-DD]
  register-admin <name> <email> <password> <organization> <admin-code> [--phone P]
  dashboard
  exams
  take <exam-id>
  review <session-id>
  results [<result-id>]
  admin stats
  admin categories
  admin category-add <name> [--description D]
  admin category-update <category-id> <name> [--description D]
  admin category-delete <category-id>
  admin exams [--page N] [--size N]
  admin exam-add <category-id> <title> --duration M --total N --passing N [--description D] [--instructions I] [--inactive]
  admin exam-update <exam-id> <category-id> <title> --duration M --total N --passing N [--description D] [--instructions I] [--inactive]
  admin exam-delete <exam-id>
  admin questions <exam-id>
  admin question-add <exam-id> <text> <A> <B> <C> <D> <answer> [--marks N] [--difficulty EASY|MEDIUM|HARD]
  admin question-update <question-id> <exam-id> <text> <A> <B> <C> <D> <answer> [--marks N] [--difficulty EASY|MEDIUM|HARD]
  admin question-delete <question-id>
  admin import <exam-id> <file.xlsx>
  admin template <output-path>
  admin students [--status S] [--page N] [--size N]
  admin student-status <student-id> <ACTIVE|INACTIVE|SUSPENDED>
  admin results [<exam-id>] [--limit N]";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Help,
    Login { admin: bool, email: String, password: String },
    Logout,
    WhoAmI,
    RegisterStudent {
        full_name: String,
        email: String,
        password: String,
        phone: Option<String>,
        date_of_birth: Option<String>,
    },
    RegisterAdmin {
        name: String,
        email: String,
        password: String,
        organization: String,
        admin_code: String,
        phone: Option<String>,
    },
    Dashboard,
    Exams,
    Take { exam_id: i64 },
    Review { session_id: i64 },
    Results { result_id: Option<i64> },
    Admin(AdminCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExamFields {
    pub(crate) category_id: i64,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: u32,
    pub(crate) total_marks: u32,
    pub(crate) passing_marks: u32,
    pub(crate) instructions: Option<String>,
    pub(crate) is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionFields {
    pub(crate) exam_id: i64,
    pub(crate) text: String,
    pub(crate) options: [String; 4],
    pub(crate) correct_answer: OptionLetter,
    pub(crate) marks: u32,
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AdminCommand {
    Stats,
    Categories,
    CategoryAdd { name: String, description: Option<String> },
    CategoryUpdate { category_id: i64, name: String, description: Option<String> },
    CategoryDelete { category_id: i64 },
    Exams { page: PageRequest },
    ExamAdd(ExamFields),
    ExamUpdate { exam_id: i64, fields: ExamFields },
    ExamDelete { exam_id: i64 },
    Questions { exam_id: i64 },
    QuestionAdd(QuestionFields),
    QuestionUpdate { question_id: i64, fields: QuestionFields },
    QuestionDelete { question_id: i64 },
    Import { exam_id: i64, file: PathBuf },
    Template { output: PathBuf },
    Students { page: PageRequest, status: Option<StudentStatus> },
    StudentStatus { student_id: i64, status: StudentStatus },
    Results { exam_id: Option<i64>, limit: u32 },
}

/// Positional arguments plus the `--flag value` and bare `--switch` options
/// that followed a subcommand.
#[derive(Debug, Default)]
struct Parsed {
    positional: Vec<String>,
    options: Vec<(String, String)>,
    switches: Vec<String>,
}

impl Parsed {
    fn collect(
        mut args: impl Iterator<Item = String>,
        options: &[&str],
        switches: &[&str],
    ) -> Result<Self> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            if options.contains(&arg.as_str()) {
                let value = args.next().ok_or_else(|| anyhow!("{arg} missing value"))?;
                parsed.options.push((arg, value));
            } else if switches.contains(&arg.as_str()) {
                parsed.switches.push(arg);
            } else if arg.starts_with("--") {
                bail!("Unknown argument: {arg}");
            } else {
                parsed.positional.push(arg);
            }
        }
        Ok(parsed)
    }

    fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    fn switch(&self, name: &str) -> bool {
        self.switches.iter().any(|switch| switch == name)
    }

    fn expect_positional(&self, count: usize, usage: &str) -> Result<()> {
        if self.positional.len() != count {
            bail!("usage: exam-portal {usage}");
        }
        Ok(())
    }

    fn optional_number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.option(name).map(|value| parse_number(name, value)).transpose()
    }

    fn required_number<T: std::str::FromStr>(&self, name: &str) -> Result<T> {
        self.optional_number(name)?.ok_or_else(|| anyhow!("{name} is required"))
    }

    fn page(&self) -> Result<PageRequest> {
        let defaults = PageRequest::default();
        Ok(PageRequest {
            page: self.optional_number("--page")?.unwrap_or(defaults.page),
            size: self.optional_number("--size")?.unwrap_or(defaults.size),
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| anyhow!("{name} expects a number, got '{value}'"))
}

fn parse_id(name: &str, value: &str) -> Result<i64> {
    parse_number(name, value)
}

pub(crate) fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "login" => {
            let parsed = Parsed::collect(args, &[], &["--admin"])?;
            parsed.expect_positional(2, "login [--admin] <email> <password>")?;
            let admin = parsed.switch("--admin");
            let mut positional = parsed.positional.into_iter();
            Ok(Command::Login {
                admin,
                email: positional.next().unwrap_or_default(),
                password: positional.next().unwrap_or_default(),
            })
        }
        "logout" => no_arguments(args, Command::Logout),
        "whoami" => no_arguments(args, Command::WhoAmI),
        "register-student" => {
            let parsed = Parsed::collect(args, &["--phone", "--dob"], &[])?;
            parsed.expect_positional(3, "register-student <full-name> <email> <password>")?;
            let phone = parsed.option("--phone").map(str::to_string);
            let date_of_birth = parsed.option("--dob").map(str::to_string);
            let mut positional = parsed.positional.into_iter();
            Ok(Command::RegisterStudent {
                full_name: positional.next().unwrap_or_default(),
                email: positional.next().unwrap_or_default(),
                password: positional.next().unwrap_or_default(),
                phone,
                date_of_birth,
            })
        }
        "register-admin" => {
            let parsed = Parsed::collect(args, &["--phone"], &[])?;
            parsed.expect_positional(
                5,
                "register-admin <name> <email> <password> <organization> <admin-code>",
            )?;
            let phone = parsed.option("--phone").map(str::to_string);
            let mut positional = parsed.positional.into_iter();
            Ok(Command::RegisterAdmin {
                name: positional.next().unwrap_or_default(),
                email: positional.next().unwrap_or_default(),
                password: positional.next().unwrap_or_default(),
                organization: positional.next().unwrap_or_default(),
                admin_code: positional.next().unwrap_or_default(),
                phone,
            })
        }
        "dashboard" => no_arguments(args, Command::Dashboard),
        "exams" => no_arguments(args, Command::Exams),
        "take" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "take <exam-id>")?;
            Ok(Command::Take { exam_id: parse_id("exam-id", &parsed.positional[0])? })
        }
        "review" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "review <session-id>")?;
            Ok(Command::Review { session_id: parse_id("session-id", &parsed.positional[0])? })
        }
        "results" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            if parsed.positional.len() > 1 {
                bail!("usage: exam-portal results [<result-id>]");
            }
            let result_id =
                parsed.positional.first().map(|value| parse_id("result-id", value)).transpose()?;
            Ok(Command::Results { result_id })
        }
        "admin" => parse_admin(args).map(Command::Admin),
        other => Err(anyhow!("Unknown command: {other}")),
    }
}

fn no_arguments(args: impl Iterator<Item = String>, command: Command) -> Result<Command> {
    reject_extra(args)?;
    Ok(command)
}

fn reject_extra(mut args: impl Iterator<Item = String>) -> Result<()> {
    match args.next() {
        Some(arg) => Err(anyhow!("Unknown argument: {arg}")),
        None => Ok(()),
    }
}

const EXAM_OPTIONS: [&str; 5] =
    ["--duration", "--total", "--passing", "--description", "--instructions"];
const QUESTION_OPTIONS: [&str; 2] = ["--marks", "--difficulty"];

fn parse_admin(mut args: impl Iterator<Item = String>) -> Result<AdminCommand> {
    let subcommand = args.next().ok_or_else(|| anyhow!("admin: missing subcommand"))?;

    match subcommand.as_str() {
        "stats" => reject_extra(args).map(|()| AdminCommand::Stats),
        "categories" => reject_extra(args).map(|()| AdminCommand::Categories),
        "category-add" => {
            let parsed = Parsed::collect(args, &["--description"], &[])?;
            parsed.expect_positional(1, "admin category-add <name>")?;
            Ok(AdminCommand::CategoryAdd {
                name: parsed.positional[0].clone(),
                description: parsed.option("--description").map(str::to_string),
            })
        }
        "category-update" => {
            let parsed = Parsed::collect(args, &["--description"], &[])?;
            parsed.expect_positional(2, "admin category-update <category-id> <name>")?;
            Ok(AdminCommand::CategoryUpdate {
                category_id: parse_id("category-id", &parsed.positional[0])?,
                name: parsed.positional[1].clone(),
                description: parsed.option("--description").map(str::to_string),
            })
        }
        "category-delete" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "admin category-delete <category-id>")?;
            Ok(AdminCommand::CategoryDelete {
                category_id: parse_id("category-id", &parsed.positional[0])?,
            })
        }
        "exams" => {
            let parsed = Parsed::collect(args, &["--page", "--size"], &[])?;
            parsed.expect_positional(0, "admin exams [--page N] [--size N]")?;
            Ok(AdminCommand::Exams { page: parsed.page()? })
        }
        "exam-add" => {
            let parsed = Parsed::collect(args, &EXAM_OPTIONS, &["--inactive"])?;
            parsed.expect_positional(2, "admin exam-add <category-id> <title> --duration M ...")?;
            Ok(AdminCommand::ExamAdd(exam_fields(&parsed, 0)?))
        }
        "exam-update" => {
            let parsed = Parsed::collect(args, &EXAM_OPTIONS, &["--inactive"])?;
            parsed.expect_positional(
                3,
                "admin exam-update <exam-id> <category-id> <title> --duration M ...",
            )?;
            Ok(AdminCommand::ExamUpdate {
                exam_id: parse_id("exam-id", &parsed.positional[0])?,
                fields: exam_fields(&parsed, 1)?,
            })
        }
        "exam-delete" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "admin exam-delete <exam-id>")?;
            Ok(AdminCommand::ExamDelete { exam_id: parse_id("exam-id", &parsed.positional[0])? })
        }
        "questions" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "admin questions <exam-id>")?;
            Ok(AdminCommand::Questions { exam_id: parse_id("exam-id", &parsed.positional[0])? })
        }
        "question-add" => {
            let parsed = Parsed::collect(args, &QUESTION_OPTIONS, &[])?;
            parsed.expect_positional(
                7,
                "admin question-add <exam-id> <text> <A> <B> <C> <D> <answer>",
            )?;
            Ok(AdminCommand::QuestionAdd(question_fields(&parsed, 0)?))
        }
        "question-update" => {
            let parsed = Parsed::collect(args, &QUESTION_OPTIONS, &[])?;
            parsed.expect_positional(
                8,
                "admin question-update <question-id> <exam-id> <text> <A> <B> <C> <D> <answer>",
            )?;
            Ok(AdminCommand::QuestionUpdate {
                question_id: parse_id("question-id", &parsed.positional[0])?,
                fields: question_fields(&parsed, 1)?,
            })
        }
        "question-delete" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "admin question-delete <question-id>")?;
            Ok(AdminCommand::QuestionDelete {
                question_id: parse_id("question-id", &parsed.positional[0])?,
            })
        }
        "import" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(2, "admin import <exam-id> <file.xlsx>")?;
            Ok(AdminCommand::Import {
                exam_id: parse_id("exam-id", &parsed.positional[0])?,
                file: PathBuf::from(&parsed.positional[1]),
            })
        }
        "template" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(1, "admin template <output-path>")?;
            Ok(AdminCommand::Template { output: PathBuf::from(&parsed.positional[0]) })
        }
        "students" => {
            let parsed = Parsed::collect(args, &["--status", "--page", "--size"], &[])?;
            parsed.expect_positional(0, "admin students [--status S] [--page N] [--size N]")?;
            let status = parsed
                .option("--status")
                .map(|value| value.parse::<StudentStatus>().map_err(|err| anyhow!(err)))
                .transpose()?;
            Ok(AdminCommand::Students { page: parsed.page()?, status })
        }
        "student-status" => {
            let parsed = Parsed::collect(args, &[], &[])?;
            parsed.expect_positional(2, "admin student-status <student-id> <status>")?;
            Ok(AdminCommand::StudentStatus {
                student_id: parse_id("student-id", &parsed.positional[0])?,
                status: parsed.positional[1].parse::<StudentStatus>().map_err(|err| anyhow!(err))?,
            })
        }
        "results" => {
            let parsed = Parsed::collect(args, &["--limit"], &[])?;
            if parsed.positional.len() > 1 {
                bail!("usage: exam-portal admin results [<exam-id>] [--limit N]");
            }
            Ok(AdminCommand::Results {
                exam_id: parsed
                    .positional
                    .first()
                    .map(|value| parse_id("exam-id", value))
                    .transpose()?,
                limit: parsed.optional_number("--limit")?.unwrap_or(10),
            })
        }
        other => Err(anyhow!("Unknown admin command: {other}")),
    }
}

fn exam_fields(parsed: &Parsed, offset: usize) -> Result<ExamFields> {
    Ok(ExamFields {
        category_id: parse_id("category-id", &parsed.positional[offset])?,
        title: parsed.positional[offset + 1].clone(),
        description: parsed.option("--description").map(str::to_string),
        duration_minutes: parsed.required_number("--duration")?,
        total_marks: parsed.required_number("--total")?,
        passing_marks: parsed.required_number("--passing")?,
        instructions: parsed.option("--instructions").map(str::to_string),
        is_active: !parsed.switch("--inactive"),
    })
}

fn question_fields(parsed: &Parsed, offset: usize) -> Result<QuestionFields> {
    let positional = &parsed.positional[offset..];
    let difficulty = match parsed.option("--difficulty") {
        Some(value) => parse_difficulty(value)?,
        None => DifficultyLevel::default(),
    };
    Ok(QuestionFields {
        exam_id: parse_id("exam-id", &positional[0])?,
        text: positional[1].clone(),
        options: [
            positional[2].clone(),
            positional[3].clone(),
            positional[4].clone(),
            positional[5].clone(),
        ],
        correct_answer: positional[6].parse::<OptionLetter>().context("answer")?,
        marks: parsed.optional_number("--marks")?.unwrap_or(1),
        difficulty,
    })
}

fn parse_difficulty(value: &str) -> Result<DifficultyLevel> {
    match value.trim().to_ascii_uppercase().as_str() {
        "EASY" => Ok(DifficultyLevel::Easy),
        "MEDIUM" => Ok(DifficultyLevel::Medium),
        "HARD" => Ok(DifficultyLevel::Hard),
        _ => Err(anyhow!("--difficulty expects EASY, MEDIUM or HARD, got '{value}'")),
    }
}
