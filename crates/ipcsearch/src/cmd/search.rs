use std::io::{Read, Write};

use ipcsearch_proto::{
    Client, PropertyId, PropertyRequest, ResultList, SearchFlags, SearchRequest, SortKey, Stream,
};
use tracing::debug;

use crate::cmd::{FoldersFirst, SearchArgs};
use crate::exit::{proto_error, stream_error, CliError, CliResult, SUCCESS};
use crate::output::{print_results, OutputFormat, Row, Totals};

/// A requested column and the label it is printed under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    label: String,
    property: PropertyId,
}

pub fn run(args: SearchArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = args.connect.connect()?;
    let columns = args
        .columns
        .iter()
        .map(|name| resolve_column(&mut client, name))
        .collect::<CliResult<Vec<_>>>()?;
    let sort = args
        .sort
        .iter()
        .map(|spec| resolve_sort(&mut client, spec))
        .collect::<CliResult<Vec<_>>>()?;
    let request = build_request(&args, &columns, sort);

    let (rows, totals) = if args.at.is_empty() {
        search_sequential(&mut client, &request)?
    } else {
        search_at(&mut client, &request, &args.at)?
    };
    debug!(rows = rows.len(), "search complete");

    let labels: Vec<String> = columns.into_iter().map(|c| c.label).collect();
    print_results(&labels, &rows, &totals, format);
    Ok(SUCCESS)
}

fn search_sequential<R: Read, W: Write>(
    client: &mut Client<R, W>,
    request: &SearchRequest,
) -> CliResult<(Vec<Row>, Totals)> {
    let mut list = client
        .search(request)
        .map_err(|err| proto_error("search failed", &err))?;
    let totals = totals(&list);

    let mut rows = Vec::new();
    while let Some(item) = list.next_item() {
        let index = totals.viewport_offset + rows.len() as u64;
        rows.push(Row {
            index,
            folder: item.is_folder(),
            values: item.values,
        });
    }
    list.finish()
        .map_err(|err| stream_error("reading results failed", &err))?;
    Ok((rows, totals))
}

/// Fetch the result list once and print the requested indexes in order.
fn search_at<R: Read, W: Write>(
    client: &mut Client<R, W>,
    request: &SearchRequest,
    indexes: &[u64],
) -> CliResult<(Vec<Row>, Totals)> {
    let mut list = client
        .search_pooled(request)
        .map_err(|err| proto_error("search failed", &err))?;
    let totals = totals(&list);

    let mut rows = Vec::with_capacity(indexes.len());
    for &index in indexes {
        let item = list
            .item_at(index)
            .map_err(|err| stream_error("reading results failed", &err))?;
        rows.push(Row {
            index: totals.viewport_offset + index,
            folder: item.is_folder(),
            values: item.values,
        });
    }
    list.finish()
        .map_err(|err| stream_error("reading results failed", &err))?;
    Ok((rows, totals))
}

fn totals<S: Stream>(list: &ResultList<S>) -> Totals {
    Totals {
        folders: list.folder_count(),
        files: list.file_count(),
        total_size: list.total_size(),
        viewport_offset: list.viewport_offset(),
        viewport_count: list.viewport_count(),
    }
}

fn build_request(args: &SearchArgs, columns: &[Column], sort: Vec<SortKey>) -> SearchRequest {
    let mut flags = SearchFlags::empty();
    for (enabled, flag) in [
        (args.match_case, SearchFlags::MATCH_CASE),
        (args.whole_word, SearchFlags::MATCH_WHOLE_WORDS),
        (args.match_path, SearchFlags::MATCH_PATH),
        (args.regex, SearchFlags::REGEX),
        (args.diacritics, SearchFlags::MATCH_DIACRITICS),
        (args.total_size, SearchFlags::REQUEST_TOTAL_SIZE),
    ] {
        if enabled {
            flags |= flag;
        }
    }
    let folders_first = match args.folders_first {
        Some(FoldersFirst::Always) => Some(SearchFlags::FOLDERS_FIRST_ALWAYS),
        Some(FoldersFirst::Never) => Some(SearchFlags::FOLDERS_FIRST_NEVER),
        Some(FoldersFirst::Descending) => Some(SearchFlags::FOLDERS_FIRST_DESCENDING),
        Some(FoldersFirst::Ascending) | None => None,
    };

    let mut request = SearchRequest::new(args.text.join(" ")).flags(flags);
    request.flags = request.flags.with_folders_first(folders_first);

    let count = match (args.count, args.at.iter().max()) {
        (Some(count), _) => count,
        (None, Some(&max)) => max.saturating_add(1),
        (None, None) => request.viewport_count,
    };
    request = request.viewport(args.offset, count);
    request.sort = sort;
    request.properties = columns
        .iter()
        .map(|column| property_request(args, column.property))
        .collect();
    request
}

fn property_request(args: &SearchArgs, property: PropertyId) -> PropertyRequest {
    let highlightable = property == PropertyId::NAME || property == PropertyId::PATH;
    if args.highlight && highlightable {
        PropertyRequest::highlighted(property)
    } else if args.formatted {
        PropertyRequest::formatted(property)
    } else {
        PropertyRequest::raw(property)
    }
}

/// Built-in name, numeric id, or a name the service resolves.
fn resolve_property<R: Read, W: Write>(
    client: &mut Client<R, W>,
    name: &str,
) -> CliResult<PropertyId> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::usage("empty property name"));
    }
    if let Some(id) = PropertyId::from_name(name) {
        return Ok(id);
    }
    if let Ok(id) = name.parse::<u32>() {
        return Ok(PropertyId(id));
    }
    match client
        .find_property(name)
        .map_err(|err| proto_error("property lookup failed", &err))?
    {
        Some(id) => {
            debug!(name, id = id.0, "service resolved property");
            Ok(id)
        }
        None => Err(CliError::usage(format!("unknown property: {name}"))),
    }
}

fn resolve_column<R: Read, W: Write>(client: &mut Client<R, W>, name: &str) -> CliResult<Column> {
    let property = resolve_property(client, name)?;
    let label = property
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| name.trim().to_string());
    Ok(Column { label, property })
}

fn resolve_sort<R: Read, W: Write>(client: &mut Client<R, W>, spec: &str) -> CliResult<SortKey> {
    let (name, direction) = spec.split_once(':').unwrap_or((spec, "asc"));
    let property = resolve_property(client, name)?;
    match direction.trim().to_ascii_lowercase().as_str() {
        "asc" | "ascending" => Ok(SortKey::ascending(property)),
        "desc" | "descending" => Ok(SortKey::descending(property)),
        other => Err(CliError::usage(format!(
            "invalid sort direction {other:?} (expected asc or desc)"
        ))),
    }
}
