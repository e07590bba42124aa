//! Page-side collection scripts.
//!
//! The detail tabs are rendered entirely by client-side code, so the data is
//! pulled out with small scripts evaluated in the page. Every collection
//! script returns a `JSON.stringify`-ed payload; classification and
//! partitioning happen on the Rust side where they can be tested.

/// Match start time from the page header; empty string when absent.
pub const READ_START_TIME: &str = r#"
(() => {
  const el = document.querySelector('.duelParticipant__startTime');
  return el ? el.innerText.trim() : '';
})()
"#;

/// Activate the head-to-head tab. The tab label depends on the site
/// language, so both variants are probed.
pub const CLICK_H2H_TAB: &str = r#"
(() => {
  const tabs = Array.from(document.querySelectorAll('a, button'));
  const tab = tabs.find(t => t.innerText.includes('H2H') || t.innerText.includes('Очные'));
  if (tab) { tab.click(); return 'clicked'; }
  return 'not found';
})()
"#;

/// Collect head-to-head rows, flat and grouped by enclosing section.
pub const COLLECT_H2H_ROWS: &str = r#"
(() => {
  const clean = el => el.innerText.replace(/\n/g, ' ').trim();
  const rows = Array.from(document.querySelectorAll('.h2h__row')).map(clean);
  const sections = Array.from(document.querySelectorAll('.h2h__section')).map(section =>
    Array.from(section.querySelectorAll('.h2h__row')).map(clean));
  return JSON.stringify({ rows: rows, sections: sections });
})()
"#;

/// Activate the match-statistics tab, excluding the sibling player-statistics
/// tab whose label shares the leading word.
pub const CLICK_STATS_TAB: &str = r#"
(() => {
  const tabs = Array.from(document.querySelectorAll('a, button, div[role="tab"], [class*="tab"]'));
  const tab = tabs.find(t => {
    const txt = (t.innerText || t.textContent || '').toUpperCase();
    return txt.includes('СТАТИСТИКА') && !txt.includes('ИГРОК');
  });
  if (tab) { tab.click(); return 'clicked'; }
  const link = document.querySelector('a[href*="match-statistics"]');
  if (link) { link.click(); return 'clicked_link'; }
  return 'not found';
})()
"#;

/// Collect statistics rows: the structured label/home/away triples where the
/// class contract holds, plus the raw text of every row-like element for the
/// fallback scan.
pub const COLLECT_STAT_ROWS: &str = r#"
(() => {
  const structured = [];
  document.querySelectorAll('[class*="stat__row"], [class*="statRow"]').forEach(row => {
    const label = row.querySelector('[class*="category"], [class*="Category"]');
    const home = row.querySelector('[class*="homeValue"], [class*="Homev"]');
    const away = row.querySelector('[class*="awayValue"], [class*="Awayv"]');
    if (label && (home || away)) {
      structured.push({
        label: label.innerText.trim(),
        home: home ? home.innerText.trim() : '0',
        away: away ? away.innerText.trim() : '0'
      });
    }
  });
  const rows = [];
  document.querySelectorAll('[class*="row"], [class*="stat"]').forEach(el => {
    if (el && el.innerText) { rows.push(el.innerText.trim()); }
  });
  return JSON.stringify({ structured: structured, rows: rows });
})()
"#;

/// Activate the player-statistics tab.
pub const CLICK_PLAYER_TAB: &str = r#"
(() => {
  const tabs = Array.from(document.querySelectorAll('button'));
  const tab = tabs.find(t => t.innerText.includes('игроков'));
  if (tab) { tab.click(); return 'clicked'; }
  return 'not found';
})()
"#;

/// Collect the ordered texts of the player-table rows. Row order matters:
/// the goalie section is announced by a marker row that only makes sense in
/// sequence.
pub const COLLECT_PLAYER_ROWS: &str = r#"
(() => {
  const rows = Array.from(document.querySelectorAll('.ui-table__row, [class*="playerStatsTable__row"]'))
    .filter(row => row && row.innerText)
    .map(row => row.innerText.trim().replace(/\n/g, ' '));
  return JSON.stringify(rows);
})()
"#;
