use clap::{Parser, Subcommand};
use eduportal::logging::TracingFormat;

/// Log in to a ZF academic portal and print one record set as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,

    /// Institution name as listed in the institutions file
    #[arg(long)]
    pub school: Option<String>,

    /// Portal root URL, e.g. https://jw.example.edu.cn/jwglxt/
    #[arg(long)]
    pub base_url: Option<String>,

    /// Student id used to log in
    #[arg(long)]
    pub sid: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and print the session cookies
    Login,
    Profile,
    Grades {
        /// Academic year; omit for every year
        #[arg(long)]
        year: Option<i32>,
        /// 1 or 2; 0 for the whole year
        #[arg(long, default_value_t = 0)]
        term: u8,
    },
    Exams {
        #[arg(long)]
        year: i32,
        #[arg(long, default_value_t = 0)]
        term: u8,
    },
    Schedule {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        term: u8,
    },
    Notifications,
    /// List every selectable class of one selection block
    BlockCourses {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        term: u8,
        #[arg(long, default_value_t = 1)]
        block: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grades_defaults() {
        let args = Args::try_parse_from(["eduportal", "--sid", "2021001", "grades"]).unwrap();
        assert_eq!(args.tracing, TracingFormat::Pretty);
        assert!(matches!(args.command, Command::Grades { year: None, term: 0 }));
    }

    #[test]
    fn test_parse_block_courses() {
        let args = Args::try_parse_from([
            "eduportal",
            "--tracing",
            "json",
            "--school",
            "示例大学",
            "--sid",
            "2021001",
            "block-courses",
            "--year",
            "2025",
            "--term",
            "1",
        ])
        .unwrap();
        assert_eq!(args.tracing, TracingFormat::Json);
        assert_eq!(args.school.as_deref(), Some("示例大学"));
        assert!(matches!(
            args.command,
            Command::BlockCourses { year: 2025, term: 1, block: 1 }
        ));
    }

    #[test]
    fn test_sid_is_required() {
        assert!(Args::try_parse_from(["eduportal", "profile"]).is_err());
    }
}
