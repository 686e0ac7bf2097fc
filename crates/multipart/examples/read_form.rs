//! Prints the parts of a multipart body.
//!
//! ```text
//! cargo run --example read_form -- body.txt 'multipart/form-data; boundary=XYZ'
//! ```
//!
//! Without arguments a small generated form is read.

use std::error::Error;
use std::io;

use bytes::Bytes;
use futures::StreamExt;
use micro_multipart::generator::PartStream;
use micro_multipart::protocol::Part;
use micro_multipart::{FormBuilder, MultipartConfig, MultipartReader, boundary_from_content_type};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = MultipartConfig::default().with_max_in_memory_size(Some(1024));
    let mut args = std::env::args().skip(1);
    let parts = match (args.next(), args.next()) {
        (Some(path), Some(content_type)) => {
            let boundary = boundary_from_content_type(&content_type)?;
            let file = tokio::fs::File::open(&path).await?;
            info!(path = %path, boundary = %boundary, "reading multipart file");
            MultipartReader::new(file, boundary, config).parts()
        }
        _ => {
            let form = FormBuilder::new("demo-boundary")
                .text("title", "hello multipart")
                .file("notes", "notes.txt", mime::TEXT_PLAIN_UTF_8, "x".repeat(4096));
            let body = form.to_bytes()?;
            info!(content_type = %form.content_type(), size = body.len(), "reading generated form");
            let chunks: Vec<io::Result<Bytes>> = body.chunks(100).map(|chunk| Ok(body.slice_ref(chunk))).collect();
            MultipartReader::from_stream(futures::stream::iter(chunks), form.boundary(), config).parts()
        }
    };

    print_parts(parts).await;
    Ok(())
}

async fn print_parts(mut parts: PartStream) {
    while let Some(part) = parts.next().await {
        let mut part = match part {
            Ok(part) => part,
            Err(e) => {
                error!(kind = ?e.kind(), cause = %e, "failed to read multipart body");
                return;
            }
        };

        match &part {
            Part::Field(field) => info!(name = field.name(), value = field.value(), "form field"),
            Part::File(file) => {
                info!(name = file.name(), filename = file.filename(), spilled = file.content().path().is_some(), "file")
            }
            Part::Data(data) => info!(name = data.name(), "data part"),
        }

        if let Err(e) = part.delete().await {
            error!(cause = %e, "failed to release part");
        }
    }
}
