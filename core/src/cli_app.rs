use crate::backend::BackendClient;
use crate::config::Config;
use crate::coordinator::SyncCoordinator;
use crate::types::{Conversation, FileAttachment, Message, MessageData, Role};
use colored::*;
use std::io::Write;

/// Interactive terminal front-end for the chat core.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let user_id = config.user_id.clone();
    let backend = BackendClient::new(config);
    let mut coordinator = SyncCoordinator::new(backend, user_id);

    println!("{}", "⚡ Filewise".bright_cyan().bold());
    println!("{}", "Loading conversations...".dimmed());
    coordinator.refresh_conversations(None).await;
    print_conversations(coordinator.store().conversations(), coordinator.store().active_id());

    let mut attachments: Vec<FileAttachment> = Vec::new();

    loop {
        prompt(&attachments);
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.splitn(2, ' ');
            let name = parts.next().unwrap_or("");
            let arg = parts.next().unwrap_or("").trim();

            match name {
                "quit" | "q" => break,
                "help" => print_usage(),
                "list" => print_conversations(
                    coordinator.store().conversations(),
                    coordinator.store().active_id(),
                ),
                "new" => {
                    coordinator.new_conversation();
                    attachments.clear();
                    println!("{}", "Started a new chat. Send a message to create it.".dimmed());
                }
                "open" => match resolve_index(arg, coordinator.store().conversations()) {
                    Some(id) => {
                        if let Err(e) = coordinator.select_conversation(&id).await {
                            eprintln!("{} {}", "✗".red().bold(), e);
                        } else if let Some(conversation) = coordinator.store().active() {
                            print_history(conversation);
                        }
                    }
                    None => eprintln!("{}", "Usage: /open <number from /list>".yellow()),
                },
                "rename" => {
                    if arg.is_empty() {
                        eprintln!("{}", "Usage: /rename <new title>".yellow());
                        continue;
                    }
                    let Some(id) = coordinator.store().active_id().map(str::to_string) else {
                        eprintln!("{}", "No conversation selected".yellow());
                        continue;
                    };
                    match coordinator.rename_conversation(&id, arg).await {
                        Ok(_) => println!("{} Conversation renamed", "✓".green().bold()),
                        Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
                    }
                }
                "delete" => {
                    let Some(id) = coordinator.store().active_id().map(str::to_string) else {
                        eprintln!("{}", "No conversation selected".yellow());
                        continue;
                    };
                    match coordinator.delete_conversation(&id).await {
                        Ok(message) => println!(
                            "{} {}",
                            "✓".green().bold(),
                            message.unwrap_or_else(|| "Conversation deleted".to_string())
                        ),
                        Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
                    }
                }
                "attach" => match load_attachment(arg) {
                    Ok(attachment) => {
                        println!(
                            "{} Attached {} ({} bytes)",
                            "✓".green().bold(),
                            attachment.name.cyan(),
                            attachment.size
                        );
                        attachments.push(attachment);
                    }
                    Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
                },
                other => {
                    eprintln!("{} Unknown command: /{}", "✗".red().bold(), other);
                    print_usage();
                }
            }
            continue;
        }

        // Plain input: one turn, attachments drained into it
        let files: Vec<FileAttachment> = attachments.drain(..).collect();
        match coordinator.send_message(line, files).await {
            Ok(()) => {
                if let Some(conversation) = coordinator.store().active() {
                    if let Some(last) = conversation.messages.last() {
                        print_message(last);
                    }
                }
            }
            Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
        }
    }

    Ok(())
}

fn prompt(attachments: &[FileAttachment]) {
    if attachments.is_empty() {
        print!("{} ", ">".bright_white().bold());
    } else {
        print!("{} {} ", format!("[{} file(s)]", attachments.len()).cyan(), ">".bright_white().bold());
    }
    let _ = std::io::stdout().flush();
}

fn print_usage() {
    println!("{}", "Commands:".bright_white().bold());
    println!("  {}                 List conversations", "/list".cyan());
    println!("  {}             Open conversation by number", "/open <n>".cyan());
    println!("  {}                  Start a new chat", "/new".cyan());
    println!("  {}      Rename the open conversation", "/rename <title>".cyan());
    println!("  {}               Delete the open conversation", "/delete".cyan());
    println!("  {}       Attach a file to the next message", "/attach <path>".cyan());
    println!("  {}                 Quit", "/quit".cyan());
    println!("  Anything else is sent as a message.");
}

fn resolve_index(arg: &str, conversations: &[Conversation]) -> Option<String> {
    let index: usize = arg.parse().ok()?;
    conversations.get(index.checked_sub(1)?).map(|c| c.id.clone())
}

fn load_attachment(path: &str) -> anyhow::Result<FileAttachment> {
    if path.is_empty() {
        anyhow::bail!("Usage: /attach <path>");
    }
    let bytes = std::fs::read(path)?;
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
    Ok(FileAttachment {
        id: crate::identity::message_id(),
        size: bytes.len() as u64,
        name,
        mime_type,
        bytes,
    })
}

fn print_conversations(conversations: &[Conversation], active_id: Option<&str>) {
    if conversations.is_empty() {
        println!("{}", "No conversations yet.".dimmed());
        return;
    }
    for (index, conversation) in conversations.iter().enumerate() {
        let marker = if Some(conversation.id.as_str()) == active_id {
            "●".green()
        } else {
            " ".normal()
        };
        println!(
            "{} {:>3}. {}  {}",
            marker,
            index + 1,
            conversation.title.bright_white(),
            conversation.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
}

fn print_history(conversation: &Conversation) {
    println!("{}", format!("── {} ──", conversation.title).bright_white().bold());
    for message in &conversation.messages {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "you".bright_blue().bold(),
        Role::Assistant => "assistant".bright_magenta().bold(),
    };
    println!("{}: {}", label, message.content);
    for file in &message.files {
        println!("   {} {}", "📎".normal(), file.name.cyan());
    }
    if let Some(data) = &message.data {
        print_data(data);
    }
}

fn print_data(data: &MessageData) {
    match data {
        MessageData::Search(search) => {
            println!(
                "   {} {} file(s), avg similarity {:.2}",
                "🔍".normal(),
                search.count,
                search.avg_similarity
            );
            for file in &search.files {
                let similarity = file
                    .similarity
                    .map(|s| format!(" ({:.0}%)", s * 100.0))
                    .unwrap_or_default();
                let link = file.best_link().unwrap_or("");
                println!("     - {}{} {}", file.name.cyan(), similarity.dimmed(), link.dimmed());
            }
        }
        MessageData::DocumentGeneration(doc) => {
            println!(
                "   {} {} [{}]",
                "📄".normal(),
                doc.document.title.cyan().bold(),
                doc.document.doc_type
            );
            for line in doc.document.content.lines().take(8) {
                println!("     {}", line);
            }
        }
        MessageData::Upload(upload) => {
            let status = if upload.already_processed {
                "already processed".yellow()
            } else {
                "uploaded".green()
            };
            println!(
                "   {} {} {}",
                "⬆".normal(),
                upload.file_name.as_deref().unwrap_or("file").cyan(),
                status
            );
            if let Some(link) = &upload.drive_link {
                println!("     {}", link.dimmed());
            }
        }
    }
}
