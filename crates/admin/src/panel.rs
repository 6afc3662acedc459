//! HTML-Verwaltungsoberflaeche
//!
//! Eine einzelne eingebettete Seite ohne Build-Schritt: zeigt den
//! Snapshot an und bietet Knoepfe fuer die Admin-Aktionen. Das Token
//! merkt sich die Seite im localStorage und schickt es als
//! `x-admin-token`-Header mit.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};

use crate::auth::{berechtigung_pruefen, TokenQuery};
use crate::AdminState;

/// `GET /admin/panel` – liefert die eingebettete Oberflaeche
pub async fn admin_panel(
    State(state): State<AdminState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }
    Html(PANEL_HTML).into_response()
}

const PANEL_HTML: &str = r#"<!DOCTYPE html>
<html lang="de">
<head>
<meta charset="utf-8">
<title>Sprechfunk Admin</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 2rem; background: #14161a; color: #e6e6e6; }
  h1 { font-size: 1.3rem; }
  table { border-collapse: collapse; margin: 1rem 0; min-width: 32rem; }
  th, td { border: 1px solid #333; padding: 0.3rem 0.7rem; text-align: left; }
  th { background: #1e2228; }
  button { margin: 0 0.15rem; cursor: pointer; }
  input { margin-right: 0.3rem; }
  #fehler { color: #ff7b72; min-height: 1.2rem; }
</style>
</head>
<body>
<h1>Sprechfunk – Verwaltung</h1>
<div id="fehler"></div>

<h2>Kanaele</h2>
<div>
  <input id="neuer-kanal" placeholder="Kanalname">
  <button onclick="kanalAnlegen()">Anlegen</button>
</div>
<table id="kanaele"><thead>
  <tr><th>Name</th><th>Eigentuemer</th><th>Mitglieder</th><th></th></tr>
</thead><tbody></tbody></table>

<h2>Clients</h2>
<table id="clients"><thead>
  <tr><th>Name</th><th>Kanal</th><th>Stumm</th><th>Spricht</th><th>Queue</th><th></th></tr>
</thead><tbody></tbody></table>

<script>
const token = localStorage.getItem('sprechfunk_token')
  || new URLSearchParams(location.search).get('token')
  || prompt('Admin-Token');
localStorage.setItem('sprechfunk_token', token);

async function api(pfad, methode, body) {
  const antwort = await fetch(pfad, {
    method: methode || 'GET',
    headers: { 'x-admin-token': token, 'content-type': 'application/json' },
    body: body ? JSON.stringify(body) : undefined,
  });
  const daten = await antwort.json().catch(() => ({}));
  if (!antwort.ok) throw new Error(daten.error || antwort.status);
  return daten;
}

function zelle(text) { const td = document.createElement('td'); td.textContent = text; return td; }

async function aktualisieren() {
  try {
    const status = await api('/admin/status');
    const kanaele = document.querySelector('#kanaele tbody');
    kanaele.innerHTML = '';
    for (const k of status.channels) {
      const zeile = document.createElement('tr');
      zeile.append(zelle(k.name), zelle(k.owner), zelle(k.users.join(', ')));
      const aktionen = document.createElement('td');
      aktionen.innerHTML = '<button>Loeschen</button>';
      aktionen.querySelector('button').onclick = () =>
        api('/admin/channel/' + encodeURIComponent(k.name), 'DELETE').then(aktualisieren).catch(zeigeFehler);
      zeile.append(aktionen);
      kanaele.append(zeile);
    }

    const clients = document.querySelector('#clients tbody');
    clients.innerHTML = '';
    for (const c of status.clients) {
      const zeile = document.createElement('tr');
      zeile.append(
        zelle(c.name || '(unregistriert)'), zelle(c.channel || '-'),
        zelle(c.muted ? 'ja' : 'nein'), zelle(c.talking ? 'ja' : 'nein'),
        zelle(c.queue_size));
      const aktionen = document.createElement('td');
      if (c.name) {
        for (const [beschriftung, aktion] of [
          ['Mute', () => api('/admin/client/' + encodeURIComponent(c.name) + '/mute', 'POST', { muted: !c.muted })],
          ['Leave', () => api('/admin/client/' + encodeURIComponent(c.name) + '/leave', 'POST')],
          ['Kick', () => api('/admin/client/' + encodeURIComponent(c.name) + '/kick', 'POST')],
        ]) {
          const knopf = document.createElement('button');
          knopf.textContent = beschriftung;
          knopf.onclick = () => aktion().then(aktualisieren).catch(zeigeFehler);
          aktionen.append(knopf);
        }
      }
      zeile.append(aktionen);
      clients.append(zeile);
    }
    document.getElementById('fehler').textContent = '';
  } catch (e) { zeigeFehler(e); }
}

function kanalAnlegen() {
  const name = document.getElementById('neuer-kanal').value;
  api('/admin/channel/create', 'POST', { channel: name }).then(aktualisieren).catch(zeigeFehler);
}

function zeigeFehler(e) { document.getElementById('fehler').textContent = String(e.message || e); }

aktualisieren();
setInterval(aktualisieren, 2000);
</script>
</body>
</html>
"#;
