use crate::channel::RegistrySnapshot;

/// Generate the aggregate playlist enumerating every known channel.
///
/// Pure function. Each entry points back at this relay's own per-channel
/// path, in configuration order.
pub fn generate_playlist(snapshot: &RegistrySnapshot, base_url: &str) -> String {
    let mut playlist = String::from("#EXTM3U\n");

    for channel in snapshot.iter() {
        playlist.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{id}\" group-title=\"{group}\",{name}\n{base_url}/{id}.m3u8\n",
            id = channel.id,
            group = channel.group,
            name = channel.name,
        ));
    }

    playlist
}
