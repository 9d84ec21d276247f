//! Local HTTP servers standing in for the upstream sources

use axum::Router;
use chrono::{Datelike, NaiveDate};

/// Serve `router` on an ephemeral local port; returns the base URL
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fixture server");
    });
    format!("http://{}", addr)
}

/// Minimal RSS 2.0 document with one item per `(title, description)`
pub fn rss_document(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, description)| {
            format!(
                "<item><title>{}</title><description>{}</description></item>",
                title, description
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Pollen</title><link>http://localhost/</link><description>Pollental</description>{}</channel></rss>"#,
        items
    )
}

/// Report page embedding one chart series per year, as the portal renders it
pub fn chart_page(points: &[(NaiveDate, i32)]) -> String {
    let mut years: Vec<i32> = points.iter().map(|(date, _)| date.year()).collect();
    years.sort_unstable();
    years.dedup();

    let series: Vec<String> = years
        .iter()
        .map(|year| {
            let data: Vec<String> = points
                .iter()
                .filter(|(date, _)| date.year() == *year)
                .map(|(date, count)| format!("[Date.UTC(1972,{},{}),{}]", date.month0(), date.day(), count))
                .collect();
            format!("{{visible:false,name:'{}',data:[{}]}}", year, data.join(","))
        })
        .collect();

    format!(
        "<html><script>$(function(){{ new Highcharts.Chart({{ chart: {{renderTo:'graf'}}, series: [{}] }}); }});</script></html>",
        series.join(",")
    )
}
