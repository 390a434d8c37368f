//! Parsing of the shell's input lines.

use sparlo_core::{AppViewModel, ReportId, ReportStatus};

pub const HELP: &str = "\
Commands:
  /reports                 reload the report list
  /search <text>           filter by headline or title (empty clears)
  /filter <status|all>     show only one status
  /open <n|id>             open a report
  /close                   close the open report
  /archive <n|id>          archive a report
  /cancel <n|id>           cancel a report that is still generating
  /new <design challenge>  start a new report
  /export                  save the open report as markdown
  /read                    print the visible part of the open report
  /toc                     print the table of contents
  /goto <section-id>       jump to a section
  /scroll <lines>          scroll the report (negative scrolls up)
  /chat                    show or hide the chat panel
  /stop                    stop the answer being streamed
  /esc                     escape key
  /back <lines>            scroll the chat back from the newest message
  /usage                   refresh token usage
  /dismiss                 clear the list error
  /quit
Anything else is sent to the chat.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reports,
    Search(String),
    Filter(Option<ReportStatus>),
    Open(String),
    Close,
    Archive(String),
    Cancel(String),
    New(String),
    Export,
    Read,
    Toc,
    Goto(String),
    Scroll(i64),
    ToggleChat,
    StopStream,
    Escape,
    ChatBack(u32),
    Usage,
    Dismiss,
    Help,
    Quit,
    Say(String),
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "reports" | "refresh" => Command::Reports,
        "search" => Command::Search(arg.to_string()),
        "filter" => match arg {
            "" | "all" => Command::Filter(None),
            raw => Command::Filter(Some(
                ReportStatus::parse(raw).ok_or_else(|| format!("unknown status {raw:?}"))?,
            )),
        },
        "open" => Command::Open(required(name, arg)?),
        "close" => Command::Close,
        "archive" => Command::Archive(required(name, arg)?),
        "cancel" => Command::Cancel(required(name, arg)?),
        "new" => Command::New(required(name, arg)?),
        "export" => Command::Export,
        "read" => Command::Read,
        "toc" => Command::Toc,
        "goto" => Command::Goto(required(name, arg)?),
        "scroll" => Command::Scroll(number(name, arg)?),
        "chat" => Command::ToggleChat,
        "stop" => Command::StopStream,
        "esc" => Command::Escape,
        "back" => Command::ChatBack(number(name, arg)?),
        "usage" => Command::Usage,
        "dismiss" => Command::Dismiss,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command /{other}; try /help")),
    };
    Ok(command)
}

/// A 1-based row number in the visible list, or a literal report id.
pub fn resolve_report(arg: &str, view: &AppViewModel) -> ReportId {
    arg.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| view.dashboard.rows.get(index))
        .map(|row| row.id.clone())
        .unwrap_or_else(|| arg.to_string())
}

fn required(name: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("/{name} needs an argument"))
    } else {
        Ok(arg.to_string())
    }
}

fn number<T: std::str::FromStr>(name: &str, arg: &str) -> Result<T, String> {
    arg.parse()
        .map_err(|_| format!("/{name} needs a number, got {arg:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sparlo_core::AppState;

    #[test]
    fn plain_text_goes_to_chat() {
        assert_eq!(parse("  why fins? "), Ok(Command::Say("why fins?".into())));
    }

    #[test]
    fn commands_take_their_arguments() {
        assert_eq!(parse("/search  Heat Sink "), Ok(Command::Search("Heat Sink".into())));
        assert_eq!(parse("/search"), Ok(Command::Search(String::new())));
        assert_eq!(
            parse("/filter confirm_rerun"),
            Ok(Command::Filter(Some(ReportStatus::ConfirmRerun)))
        );
        assert_eq!(parse("/filter all"), Ok(Command::Filter(None)));
        assert_eq!(parse("/scroll -4"), Ok(Command::Scroll(-4)));
        assert_eq!(parse("/ESC"), Ok(Command::Escape));
    }

    #[test]
    fn bad_input_is_explained() {
        assert!(parse("/open").unwrap_err().contains("needs an argument"));
        assert!(parse("/filter shiny").unwrap_err().contains("unknown status"));
        assert!(parse("/scroll lots").unwrap_err().contains("needs a number"));
        assert!(parse("/frobnicate").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn row_numbers_fall_back_to_ids() {
        let view = AppState::new().view();
        assert_eq!(resolve_report("1", &view), "1");
        assert_eq!(resolve_report("rep-7", &view), "rep-7");
    }
}
