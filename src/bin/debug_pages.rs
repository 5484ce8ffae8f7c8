use ffn_report::section::{classify_page, SectionVerdict};
use ffn_report::{PageSource, PdfPageSource, TableDetectionConfig};
use std::env;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_pages <pdf_path> [max_page | min-max]");
        std::process::exit(1);
    }

    let range = args.get(2).map(|s| s.as_str()).unwrap_or("1-3");
    let (min_page, max_page): (usize, usize) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };

    let source = match PdfPageSource::open(&args[1], &TableDetectionConfig::default()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let last = max_page.min(source.page_count());
    for number in min_page.max(1)..=last {
        let page = match source.page(number - 1) {
            Ok(page) => page,
            Err(e) => {
                println!("=== PAGE {} (unreadable: {}) ===", number, e);
                println!();
                continue;
            }
        };

        let section = match classify_page(&page.text) {
            SectionVerdict::Heading(fraud_type) => fraud_type.to_string(),
            SectionVerdict::Unchanged => "-".to_string(),
        };
        println!(
            "=== PAGE {} ({} grids, section: {}) ===",
            page.number,
            page.grids.len(),
            section
        );
        println!("{}", page.text);

        for (i, grid) in page.grids.iter().enumerate() {
            println!("--- grid {} ({} rows x {} cols) ---", i, grid.rows.len(), grid.width());
            for row in &grid.rows {
                let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("·")).collect();
                println!("  | {} |", cells.join(" | "));
            }
        }
        println!();
    }
}
